//! PartSelect chat
//!
//! Entry point: terminal chat client (default) or the ask endpoint (`serve`).

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use partselect_chat::agent::{LlmAgent, PartsTools};
use partselect_chat::config::{AppConfig, Cli, Command, load_llm_settings};
use partselect_chat::llm::{ChatCompletionsDriver, EmbeddingsClient};
use partselect_chat::retrieval::SupabaseKnowledge;
use partselect_chat::session::ChatSession;
use partselect_chat::transport::HttpTransport;
use partselect_chat::{repl, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json, cli.command().default_log_level());

    let config = match AppConfig::from_cli(&cli) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    match cli.command() {
        Command::Chat => run_chat(&config).await,
        Command::Serve => run_server(config).await,
    }
}

/// Initialize tracing (M-LOG-STRUCTURED). Logs go to stderr so they stay out
/// of the chat transcript on stdout. `RUST_LOG` overrides `level`.
fn init_tracing(json: bool, level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run_chat(config: &AppConfig) -> anyhow::Result<()> {
    let endpoint = config.client.endpoint_url()?;
    let transport = HttpTransport::with_timeout(endpoint, config.client.timeout())?;

    info!(
        name: "chat.config.loaded",
        endpoint = %transport.endpoint(),
        timeout_secs = config.client.timeout_secs,
        "Chat client configured"
    );

    let session = ChatSession::new(Arc::new(transport))
        .with_fallback_text(config.client.fallback_text.clone());

    repl::run(
        &session,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

async fn run_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = match load_llm_settings() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );

    let mut agent = LlmAgent::new(ChatCompletionsDriver::new(settings.clone()));

    match &settings.retrieval {
        Some(retrieval) => {
            info!(
                name: "retrieval.config.loaded",
                supabase_url = %retrieval.supabase_url,
                embedding_model = %retrieval.embedding_model,
                "Product retrieval tools enabled"
            );
            let embeddings = EmbeddingsClient::new(&settings, retrieval.embedding_model.clone());
            let knowledge = SupabaseKnowledge::new(retrieval.clone(), embeddings);
            agent = agent.with_tools(PartsTools::new(Arc::new(knowledge)));
        }
        None => warn!(
            name: "retrieval.disabled",
            "SUPABASE_URL or SUPABASE_SERVICE_KEY not set; answering without product retrieval"
        ),
    }

    server::start_server(config, Arc::new(agent)).await
}
