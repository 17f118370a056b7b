use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_test::TestServer;
use serde_json::{Value, json};

use partselect_chat::AppState;
use partselect_chat::agent::{LlmAgent, PartsTools};
use partselect_chat::llm::{ChatCompletionsDriver, EmbeddingsClient, LlmSettings, Provider};
use partselect_chat::retrieval::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_MATCH_COUNT, RetrievalSettings, SupabaseKnowledge,
};
use partselect_chat::server::router;

const SERVICE_KEY: &str = "service-key";
const PAGE_A: &str = "https://www.partselect.com/PS11752778.htm";
const PAGE_B: &str = "https://www.partselect.com/PS12364199.htm";

/// One process standing in for the model API and the Supabase project.
#[derive(Default)]
struct Backend {
    /// Completion replies in order; the last one repeats once the rest are used.
    script: Mutex<VecDeque<Value>>,
    rpc_fails: bool,
    chat_requests: Mutex<Vec<Value>>,
    embedding_requests: Mutex<Vec<(HeaderMap, Value)>>,
    rpc_requests: Mutex<Vec<(HeaderMap, Value)>>,
    table_queries: Mutex<Vec<(HeaderMap, HashMap<String, String>)>>,
}

impl Backend {
    fn scripted(replies: Vec<Value>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }
}

async fn chat_completions(State(b): State<Arc<Backend>>, Json(body): Json<Value>) -> Json<Value> {
    b.chat_requests.lock().unwrap().push(body);
    let mut script = b.script.lock().unwrap();
    let reply = if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script.front().cloned().unwrap()
    };
    Json(reply)
}

async fn embeddings(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    b.embedding_requests.lock().unwrap().push((headers, body));
    Json(json!({ "data": [{ "index": 0, "embedding": [0.5, -0.25, 1.0] }] }))
}

async fn match_chunks(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    b.rpc_requests.lock().unwrap().push((headers, body));
    if b.rpc_fails {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "function match_partselect_chunks does not exist" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!([
            { "content": "Ice maker assembly W10882923.", "url": PAGE_A, "similarity": 0.91 },
            { "content": "Fits Whirlpool WRS325SDHZ.", "url": PAGE_A, "similarity": 0.88 }
        ])),
    )
}

async fn chunks_table(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    b.table_queries
        .lock()
        .unwrap()
        .push((headers, params.clone()));

    match params.get("select").map(String::as_str) {
        Some("url") => Json(json!([{ "url": PAGE_B }, { "url": PAGE_A }, { "url": PAGE_B }])),
        Some("content") if params.get("url") == Some(&format!("eq.{PAGE_A}")) => {
            Json(json!([
                { "content": "Door shelf bin." },
                { "content": "Slide the bin up and out to remove it." }
            ]))
        }
        _ => Json(json!([])),
    }
}

async fn start_backend(backend: Backend) -> (String, Arc<Backend>) {
    let backend = Arc::new(backend);
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/rest/v1/rpc/match_partselect_chunks", post(match_chunks))
        .route("/rest/v1/partselect_chunks", get(chunks_table))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), backend)
}

fn ask_server(base_url: &str) -> TestServer {
    let retrieval = RetrievalSettings {
        supabase_url: base_url.to_string(),
        service_key: SERVICE_KEY.to_string(),
        embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        match_count: DEFAULT_MATCH_COUNT,
    };
    let settings = LlmSettings {
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
        model: "gpt-4o-mini".to_string(),
        provider: Provider::detect_from_url(base_url),
        retrieval: Some(retrieval.clone()),
    };

    let embeddings = EmbeddingsClient::new(&settings, retrieval.embedding_model.clone());
    let knowledge = SupabaseKnowledge::new(retrieval, embeddings);
    let agent = LlmAgent::new(ChatCompletionsDriver::new(settings))
        .with_tools(PartsTools::new(Arc::new(knowledge)));

    let app = router(
        AppState {
            agent: Arc::new(agent),
        },
        Duration::from_secs(10),
    );
    TestServer::new(app).unwrap()
}

fn tool_call_reply(calls: &[(&str, &str, Value)]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": { "name": name, "arguments": args.to_string() }
            })
        })
        .collect();
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": null, "tool_calls": calls },
            "finish_reason": "tool_calls"
        }]
    })
}

fn text_reply(text: &str) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

fn tool_messages(request: &Value) -> Vec<Value> {
    request["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "tool")
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_search_results_are_fed_back_to_model() {
    let (base_url, backend) = start_backend(Backend::scripted(vec![
        tool_call_reply(&[("call_1", "search_parts_content", json!({ "query": "ice maker" }))]),
        text_reply("The W10882923 ice maker fits the WRS325SDHZ."),
    ]))
    .await;
    let server = ask_server(&base_url);

    let response = server
        .post("/ask")
        .json(&json!({ "message": "Which ice maker fits my fridge?", "history": [] }))
        .await;

    response.assert_json(&json!({ "response": "The W10882923 ice maker fits the WRS325SDHZ." }));

    let chat_requests = backend.chat_requests.lock().unwrap();
    assert_eq!(chat_requests.len(), 2);

    let tool_names: Vec<&str> = chat_requests[0]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        tool_names,
        vec!["search_parts_content", "list_product_urls", "get_page_content"]
    );

    let messages = chat_requests[1]["messages"].as_array().unwrap();
    let assistant = &messages[messages.len() - 2];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
    assert_eq!(
        messages.last().unwrap(),
        &json!({
            "role": "tool",
            "tool_call_id": "call_1",
            "content": "Ice maker assembly W10882923.\n\n---\n\nFits Whirlpool WRS325SDHZ."
        })
    );

    let embedding_requests = backend.embedding_requests.lock().unwrap();
    assert_eq!(embedding_requests.len(), 1);
    assert_eq!(
        embedding_requests[0].1,
        json!({ "model": "text-embedding-3-small", "input": "ice maker" })
    );
    assert_eq!(embedding_requests[0].0["authorization"], "Bearer test-key");

    let rpc_requests = backend.rpc_requests.lock().unwrap();
    assert_eq!(rpc_requests.len(), 1);
    let (headers, body) = &rpc_requests[0];
    assert_eq!(body["match_count"], 5);
    assert_eq!(body["query_embedding"], json!([0.5, -0.25, 1.0]));
    assert_eq!(headers["apikey"], SERVICE_KEY);
    assert_eq!(headers["authorization"], format!("Bearer {SERVICE_KEY}"));
}

#[tokio::test]
async fn test_url_listing_and_page_content() {
    let (base_url, backend) = start_backend(Backend::scripted(vec![
        tool_call_reply(&[
            ("call_urls", "list_product_urls", json!({})),
            ("call_page", "get_page_content", json!({ "url": PAGE_A })),
        ]),
        text_reply("Lift the door bin straight up."),
    ]))
    .await;
    let server = ask_server(&base_url);

    server
        .post("/ask")
        .json(&json!({ "message": "How do I remove the door bin?", "history": [] }))
        .await
        .assert_json(&json!({ "response": "Lift the door bin straight up." }));

    let chat_requests = backend.chat_requests.lock().unwrap();
    let tools = tool_messages(&chat_requests[1]);
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0]["tool_call_id"], "call_urls");
    assert_eq!(
        tools[0]["content"],
        serde_json::to_string(&[PAGE_A, PAGE_B]).unwrap()
    );
    assert_eq!(tools[1]["tool_call_id"], "call_page");
    assert_eq!(
        tools[1]["content"],
        "Door shelf bin.\n\nSlide the bin up and out to remove it."
    );

    let queries = backend.table_queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].1.get("select").map(String::as_str), Some("url"));
    assert_eq!(queries[1].1.get("select").map(String::as_str), Some("content"));
    assert_eq!(
        queries[1].1.get("url").cloned(),
        Some(format!("eq.{PAGE_A}"))
    );
    assert!(queries.iter().all(|(h, _)| h["apikey"] == SERVICE_KEY));
}

#[tokio::test]
async fn test_search_failure_reaches_model_as_text() {
    let backend = Backend {
        rpc_fails: true,
        ..Backend::scripted(vec![
            tool_call_reply(&[("call_1", "search_parts_content", json!({ "query": "dryer belt" }))]),
            text_reply("I couldn't look that up right now."),
        ])
    };
    let (base_url, backend) = start_backend(backend).await;
    let server = ask_server(&base_url);

    server
        .post("/ask")
        .json(&json!({ "message": "Which belt fits my dryer?", "history": [] }))
        .await
        .assert_json(&json!({ "response": "I couldn't look that up right now." }));

    let chat_requests = backend.chat_requests.lock().unwrap();
    let tools = tool_messages(&chat_requests[1]);
    let content = tools[0]["content"].as_str().unwrap();
    assert!(
        content.starts_with("Error during vector search:"),
        "unexpected tool result: {content}"
    );
}

#[tokio::test]
async fn test_endless_tool_calls_stop_at_limit() {
    let (base_url, backend) = start_backend(Backend::scripted(vec![tool_call_reply(&[(
        "call_again",
        "list_product_urls",
        json!({}),
    )])]))
    .await;
    let server = ask_server(&base_url);

    let body: Value = server
        .post("/ask")
        .json(&json!({ "message": "hello", "history": [] }))
        .await
        .json();

    assert!(body.get("response").is_none());
    let error = body["error"].as_str().unwrap();
    assert!(
        error.contains("Maximum tool loop iterations"),
        "unexpected error: {error}"
    );
    assert_eq!(backend.chat_requests.lock().unwrap().len(), 10);
}
