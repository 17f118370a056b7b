//! Request transport: one JSON request, one JSON response.
//!
//! The [`RequestTransport`] trait is the only thing a
//! [`ChatSession`](crate::session::ChatSession) knows about the remote side.
//! [`HttpTransport`] implements it over HTTP; tests substitute their own.
//!
//! # Wire format
//!
//! ```text
//! POST <endpoint>
//! Content-Type: application/json
//!
//! { "message": "hello", "history": [ { "role": "user", "content": "hello" } ] }
//! ```
//!
//! The reply is `{ "response": "..." }` on success or `{ "error": "..." }`
//! otherwise. Both fields are optional on the wire.

mod http;

pub use http::HttpTransport;

use serde::{Deserialize, Serialize};

use crate::session::Turn;

/// Body sent to the ask endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    /// The text the user just submitted.
    pub message: String,
    /// Full transcript, including the turn for `message`.
    #[serde(default)]
    pub history: Vec<Turn>,
}

/// Body returned by the ask endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AskResponse {
    /// A successful reply.
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            error: None,
        }
    }

    /// An application-level failure.
    #[must_use]
    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            response: None,
            error: Some(text.into()),
        }
    }

    /// Text to show as the agent turn.
    ///
    /// Empty strings count as absent, so `{"response": ""}` falls through to
    /// `error`, and an empty `error` falls through to `fallback`.
    #[must_use]
    pub fn into_reply_text(self, fallback: &str) -> String {
        self.response
            .filter(|s| !s.is_empty())
            .or_else(|| self.error.filter(|s| !s.is_empty()))
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Failure below the application level.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, TLS, timeout or body read failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success status with a body that was not an ask response.
    #[error("endpoint returned status {0}")]
    Status(u16),
    /// Success status but the body was not an ask response.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A single request/response exchange with the ask endpoint.
#[async_trait::async_trait]
pub trait RequestTransport: Send + Sync {
    /// Send one request and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no well-formed response was received.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, TransportError>;
}
