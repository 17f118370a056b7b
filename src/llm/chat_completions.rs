//! `OpenAI` Chat Completions API driver.
//!
//! Sends a non-streaming request to `/v1/chat/completions` (or the Azure
//! deployment URL) and returns the first choice: its text, its tool calls, or
//! both.

use anyhow::{Context, anyhow};
use serde::Deserialize;

use super::{ChatMessage, LlmSettings, ToolCall};

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// The assistant message of the first choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Assistant text; `None` when the model only called tools.
    pub content: Option<String>,
    /// Tool calls the model wants executed.
    pub tool_calls: Vec<ToolCall>,
}

/// Driver for the `OpenAI` Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Run one completion without tools and return the assistant text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API reports an error, or the
    /// reply has no text content.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> anyhow::Result<String> {
        let messages = messages
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        self.complete_with_tools(&messages, &[])
            .await?
            .content
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("completion response had no content"))
    }

    /// Run one completion over raw message JSON, offering `tools` in `OpenAI`
    /// function schema format.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API reports an error, or the
    /// reply has neither text nor tool calls.
    pub async fn complete_with_tools(
        &self,
        messages: &[serde_json::Value],
        tools: &[serde_json::Value],
    ) -> anyhow::Result<Completion> {
        let url = self.settings.provider.build_chat_url(&self.settings.base_url);

        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": false,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools.to_vec());
        }

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = if self.settings.provider.uses_api_key_header() {
                rb.header("api-key", k)
            } else {
                rb.bearer_auth(k)
            };
        }

        let resp = rb.send().await.context("LLM request failed")?;
        let status = resp.status();
        let bytes = resp.bytes().await.context("failed to read LLM response")?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorEnvelope>(&bytes) {
                Ok(env) => anyhow!("LLM API error ({status}): {}", env.error.message),
                Err(_) => anyhow!("LLM API error ({status})"),
            });
        }

        parse_completion(&bytes)
    }
}

/// Extract the first choice from a completion body.
fn parse_completion(bytes: &[u8]) -> anyhow::Result<Completion> {
    let parsed: CompletionResponse =
        serde_json::from_slice(bytes).context("malformed completion response")?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| anyhow!("completion response had no content"))?;

    let completion = Completion {
        content: message.content.filter(|s| !s.is_empty()),
        tool_calls: message.tool_calls.unwrap_or_default(),
    };

    if completion.content.is_none() && completion.tool_calls.is_empty() {
        return Err(anyhow!("completion response had no content"));
    }
    Ok(completion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":"Part PS123 fits."}},{"message":{"content":"other"}}]}"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.content.as_deref(), Some("Part PS123 fits."));
        assert!(completion.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_tool_calls() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
            {"id":"call_1","type":"function","function":{"name":"search_parts_content","arguments":"{\"query\":\"ice maker\"}"}}
        ]},"finish_reason":"tool_calls"}]}"#;

        let completion = parse_completion(body).unwrap();

        assert_eq!(completion.content, None);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_1");
        assert_eq!(completion.tool_calls[0].function.name, "search_parts_content");
        assert_eq!(
            completion.tool_calls[0].function.arguments,
            r#"{"query":"ice maker"}"#
        );
    }

    #[test]
    fn test_parse_no_choices_is_error() {
        assert!(parse_completion(br#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn test_parse_null_content_is_error() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(parse_completion(body).is_err());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_completion(b"<html>").is_err());
    }
}
