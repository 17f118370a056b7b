//! Command line, layered configuration and LLM settings.
//!
//! Priority: CLI flag > the flag's env var > `PARTSELECT_*` env > config file
//! > defaults. The config file is `--config`/`CONFIG_FILE` if given, otherwise
//! `./config.{yaml,toml,json}` when present.

use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use tracing::level_filters::LevelFilter;

use crate::llm::{DEFAULT_MODEL, LlmSettings, Provider, provider::DEFAULT_AZURE_API_VERSION};
use crate::retrieval::{DEFAULT_EMBEDDING_MODEL, DEFAULT_MATCH_COUNT, RetrievalSettings};
use crate::session::DEFAULT_FALLBACK_TEXT;

/// Prefix for layered environment overrides, e.g. `PARTSELECT_SERVER__PORT`.
const ENV_PREFIX: &str = "PARTSELECT";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<String>,

    /// Ask endpoint the chat client posts to
    #[arg(long, env = "CHAT_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Port the ask endpoint listens on
    #[arg(long, env = "PORT", global = true)]
    pub port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat in the terminal (default)
    #[default]
    Chat,
    /// Serve the ask endpoint
    Serve,
}

impl Command {
    /// Log level used when `RUST_LOG` is unset. Chat shares the terminal with
    /// the transcript, so it only reports warnings.
    #[must_use]
    pub fn default_log_level(self) -> LevelFilter {
        match self {
            Self::Chat => LevelFilter::WARN,
            Self::Serve => LevelFilter::INFO,
        }
    }
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Seconds before an ask request is abandoned; 0 waits forever.
    pub timeout_secs: u64,
    pub fallback_text: String,
}

impl ClientConfig {
    pub fn endpoint_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.endpoint)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("client.endpoint", "http://localhost:8000/ask")?
            .set_default("client.timeout_secs", 0)?
            .set_default("client.fallback_text", DEFAULT_FALLBACK_TEXT)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("server.request_timeout_secs", 120)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(Path::new(path)).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(endpoint) = &cli.endpoint {
            builder = builder.set_override("client.endpoint", endpoint.as_str())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;

        cfg.client.endpoint_url().map_err(|e| {
            config::ConfigError::Message(format!(
                "invalid client.endpoint '{}': {e}",
                cfg.client.endpoint
            ))
        })?;

        Ok(cfg)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Read LLM settings for the ask endpoint from `LLM_*` environment variables.
///
/// Retrieval is enabled when both `SUPABASE_URL` and `SUPABASE_SERVICE_KEY`
/// are set.
pub fn load_llm_settings() -> Result<LlmSettings, String> {
    let base_url = std::env::var("LLM_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "https://api.openai.com".to_string());

    let model = std::env::var("LLM_MODEL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    // OPENAI_API_KEY is accepted for compatibility with stock OpenAI setups.
    let api_key = std::env::var("LLM_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok()
        .filter(|s| !s.trim().is_empty());

    let mut provider = Provider::detect_from_url(&base_url);

    if let Provider::AzureOpenAI { .. } = &provider {
        let deployment_name = std::env::var("AZURE_DEPLOYMENT_NAME")
            .map_err(|e| format!("Azure OpenAI requires AZURE_DEPLOYMENT_NAME: {e}"))?;
        let api_version = std::env::var("AZURE_API_VERSION")
            .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string());
        provider = Provider::AzureOpenAI {
            deployment_name,
            api_version,
        };
    }

    let supabase = (
        non_empty_var("SUPABASE_URL"),
        non_empty_var("SUPABASE_SERVICE_KEY"),
    );
    let retrieval = match supabase {
        (Some(supabase_url), Some(service_key)) => Some(RetrievalSettings {
            supabase_url,
            service_key,
            embedding_model: non_empty_var("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            match_count: DEFAULT_MATCH_COUNT,
        }),
        _ => None,
    };

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
        retrieval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_defaults_to_chat() {
        let cli = Cli::try_parse_from(["partselect-chat"]).unwrap();
        assert_eq!(cli.command(), Command::Chat);

        let cli = Cli::try_parse_from(["partselect-chat", "serve", "--log-json"]).unwrap();
        assert_eq!(cli.command(), Command::Serve);
        assert!(cli.log_json);
    }

    #[test]
    fn test_chat_logs_quieter_than_serve() {
        assert_eq!(Command::Chat.default_log_level(), LevelFilter::WARN);
        assert_eq!(Command::Serve.default_log_level(), LevelFilter::INFO);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let client = ClientConfig {
            endpoint: "http://localhost:8000/ask".to_string(),
            timeout_secs: 0,
            fallback_text: "Error".to_string(),
        };
        assert_eq!(client.timeout(), None);

        let client = ClientConfig {
            timeout_secs: 30,
            ..client
        };
        assert_eq!(client.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_server_address() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            request_timeout_secs: 120,
        };
        assert_eq!(server.address(), "127.0.0.1:8000");
    }
}
