//! The assistant behind the ask endpoint.
//!
//! [`LlmAgent`] sends the conversation to a Chat Completions model. When it
//! has [`PartsTools`], it runs a tool loop:
//! 1. Send the conversation with the tool definitions
//! 2. Execute any tool calls the model makes
//! 3. Feed the tool results back as `tool` messages
//! 4. Repeat until the model answers in text

pub mod tools;

pub use tools::PartsTools;

use serde_json::{Value, json};

use crate::llm::{ChatCompletionsDriver, ChatMessage};
use crate::session::{Role, Turn};

/// Maximum number of tool loop iterations to prevent infinite loops.
const MAX_TOOL_ITERATIONS: usize = 10;

/// Instructions given to the model ahead of every conversation.
pub const SYSTEM_PROMPT: &str = "\
You are a support assistant for PartSelect, answering questions about appliance \
parts: what a part does, which models it fits, how it is installed and what \
accessories go with it. Product pages are stored as searchable text chunks.

Only help with PartSelect appliance parts. Politely decline unrelated requests.

Before answering a question about a part, product type or repair, call \
search_parts_content. Use list_product_urls to see which pages are stored, and \
get_page_content when the full text of one page would help. Act without asking \
the user for permission first.

If the tools return nothing relevant, tell the user plainly instead of guessing.";

/// Answers one ask request given the conversation so far.
#[async_trait::async_trait]
pub trait AskAgent: Send + Sync {
    /// Produce the reply text for `message`.
    ///
    /// `history` is the transcript as the client sent it, usually ending with
    /// the user turn for `message`.
    async fn answer(&self, message: &str, history: &[Turn]) -> anyhow::Result<String>;
}

/// [`AskAgent`] backed by a Chat Completions model.
#[derive(Debug, Clone)]
pub struct LlmAgent {
    driver: ChatCompletionsDriver,
    system_prompt: String,
    tools: Option<PartsTools>,
}

impl LlmAgent {
    #[must_use]
    pub fn new(driver: ChatCompletionsDriver) -> Self {
        Self {
            driver,
            system_prompt: SYSTEM_PROMPT.to_string(),
            tools: None,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Let the model retrieve product content while answering.
    #[must_use]
    pub fn with_tools(mut self, tools: PartsTools) -> Self {
        self.tools = Some(tools);
        self
    }

    async fn run_tool_loop(
        &self,
        tools: &PartsTools,
        mut messages: Vec<Value>,
    ) -> anyhow::Result<String> {
        let definitions = tools.definitions();

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            let completion = self.driver.complete_with_tools(&messages, &definitions).await?;

            if completion.tool_calls.is_empty() {
                tracing::debug!(
                    name: "agent.llm.answered",
                    iteration = iteration,
                    "Model answered"
                );
                return completion
                    .content
                    .ok_or_else(|| anyhow::anyhow!("completion response had no content"));
            }

            tracing::info!(
                name: "agent.tools.requested",
                iteration = iteration,
                tool_call_count = completion.tool_calls.len(),
                "Model requested tool calls"
            );

            // Add assistant message with tool calls to history
            messages.push(json!({
                "role": "assistant",
                "content": completion.content,
                "tool_calls": completion.tool_calls,
            }));

            for tool_call in &completion.tool_calls {
                let content = tools
                    .call(&tool_call.function.name, &tool_call.function.arguments)
                    .await;

                tracing::info!(
                    name: "agent.tool.executed",
                    iteration = iteration,
                    tool_id = %tool_call.id,
                    tool_name = %tool_call.function.name,
                    result_length = content.len(),
                    "Tool call executed"
                );

                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_call.id,
                    "content": content,
                }));
            }
        }

        tracing::error!(
            name: "agent.tools.exhausted",
            max_iterations = MAX_TOOL_ITERATIONS,
            "Maximum tool loop iterations exceeded"
        );
        Err(anyhow::anyhow!("Maximum tool loop iterations exceeded"))
    }
}

#[async_trait::async_trait]
impl AskAgent for LlmAgent {
    async fn answer(&self, message: &str, history: &[Turn]) -> anyhow::Result<String> {
        let messages = build_messages(&self.system_prompt, message, history);
        tracing::debug!(
            name: "agent.llm.request",
            model = %self.driver.settings().model,
            messages = messages.len(),
            tools = self.tools.is_some(),
            "Requesting completion"
        );

        match &self.tools {
            Some(tools) => {
                let messages = messages
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()?;
                self.run_tool_loop(tools, messages).await
            }
            None => self.driver.complete(messages).await,
        }
    }
}

/// Turn a client transcript into Chat Completions messages.
///
/// `message` is only appended when the history does not already end with it
/// as a user turn.
#[must_use]
pub fn build_messages(system_prompt: &str, message: &str, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));

    messages.extend(history.iter().map(|turn| match turn.role() {
        Role::User => ChatMessage::user(turn.content()),
        Role::Agent => ChatMessage::assistant(turn.content()),
    }));

    let already_last = history
        .last()
        .is_some_and(|t| t.role() == Role::User && t.content() == message);
    if !already_last {
        messages.push(ChatMessage::user(message));
    }

    messages
}
