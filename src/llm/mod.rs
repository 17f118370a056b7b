//! LLM client used by the ask endpoint.
//!
//! The endpoint talks to any OpenAI-compatible Chat Completions API. Provider
//! differences (URL layout, auth header) are handled by [`Provider`].
//!
//! # Example
//!
//! ```rust,ignore
//! use partselect_chat::llm::{ChatCompletionsDriver, ChatMessage, LlmSettings, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-4o-mini".to_string(),
//!     provider: Provider::OpenAI,
//!     retrieval: None,
//! };
//! let driver = ChatCompletionsDriver::new(settings);
//! let text = driver.complete(vec![ChatMessage::user("hello")]).await?;
//! ```

pub mod chat_completions;
pub mod embeddings;
pub mod provider;

pub use chat_completions::{ChatCompletionsDriver, Completion};
pub use embeddings::EmbeddingsClient;
pub use provider::Provider;

use crate::retrieval::RetrievalSettings;

use serde::{Deserialize, Serialize};

/// Default model when `LLM_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// LLM connection and model settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4o-mini`).
    pub model: String,
    /// Provider type, detected from `base_url` unless set explicitly.
    pub provider: Provider,
    /// Product knowledge store; `None` runs the agent without tools.
    pub retrieval: Option<RetrievalSettings>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("retrieval", &self.retrieval)
            .finish()
    }
}

/// Role of a Chat Completions message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A Chat Completions message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// Type of tool (always "function" for now).
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    /// Function details.
    pub function: ToolCallFunction,
}

fn function_type() -> String {
    "function".to_string()
}

/// Function details in a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Function name.
    pub name: String,
    /// Arguments as JSON string.
    #[serde(default)]
    pub arguments: String,
}
