use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::agent::AskAgent;
use crate::config::AppConfig;
use crate::transport::{AskRequest, AskResponse};

/// Start the ask endpoint with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, agent: Arc<dyn AskAgent>) -> anyhow::Result<()> {
    let state = AppState { agent };
    let app = router(state, config.server.request_timeout());

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the router: `POST /ask`, `GET /health`, tracing, CORS and a
/// per-request timeout.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(request_timeout, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        // The browser front end calls from another origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /ask - Answer a message given the conversation so far.
///
/// Agent failures are reported in the body as `{"error": ...}` with a 200
/// status, which is what chat clients expect.
async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> Json<AskResponse> {
    info!(
        name: "ask.received",
        history_len = req.history.len(),
        "Received ask request"
    );

    match state.agent.answer(&req.message, &req.history).await {
        Ok(text) => Json(AskResponse::success(text)),
        Err(e) => {
            tracing::error!(
                name: "ask.failed",
                error = %format!("{e:#}"),
                "Agent failed to answer"
            );
            Json(AskResponse::failure(format!("{e:#}")))
        }
    }
}

/// GET /health - Liveness probe.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;
    use axum::body::Body;
    use tower::ServiceExt;

    struct EchoAgent;

    #[async_trait::async_trait]
    impl AskAgent for EchoAgent {
        async fn answer(&self, message: &str, history: &[Turn]) -> anyhow::Result<String> {
            Ok(format!("{message} ({} turns)", history.len()))
        }
    }

    #[tokio::test]
    async fn test_ask_route() {
        let app = router(
            AppState {
                agent: Arc::new(EchoAgent),
            },
            Duration::from_secs(5),
        );

        let body = serde_json::json!({
            "message": "hello",
            "history": [{ "role": "user", "content": "hello" }]
        });
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: AskResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, AskResponse::success("hello (1 turns)"));
    }
}
