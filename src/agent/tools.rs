//! Retrieval tools offered to the model.
//!
//! Every call produces text for the model. Failures are reported in that text
//! rather than aborting the conversation.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::retrieval::PartsKnowledge;

pub const SEARCH_PARTS_CONTENT: &str = "search_parts_content";
pub const LIST_PRODUCT_URLS: &str = "list_product_urls";
pub const GET_PAGE_CONTENT: &str = "get_page_content";

/// Separator between search hits.
const MATCH_SEPARATOR: &str = "\n\n---\n\n";

/// The PartSelect retrieval toolset.
#[derive(Clone)]
pub struct PartsTools {
    knowledge: Arc<dyn PartsKnowledge>,
}

impl std::fmt::Debug for PartsTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartsTools").finish_non_exhaustive()
    }
}

impl PartsTools {
    #[must_use]
    pub fn new(knowledge: Arc<dyn PartsKnowledge>) -> Self {
        Self { knowledge }
    }

    /// Tool definitions in `OpenAI` function schema format.
    #[must_use]
    pub fn definitions(&self) -> Vec<Value> {
        vec![
            function(
                SEARCH_PARTS_CONTENT,
                "Semantic search over PartSelect product content. Returns the most relevant text chunks.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "What to look for" }
                    },
                    "required": ["query"]
                }),
            ),
            function(
                LIST_PRODUCT_URLS,
                "List every PartSelect product page URL that has stored content.",
                json!({ "type": "object", "properties": {} }),
            ),
            function(
                GET_PAGE_CONTENT,
                "Fetch the full stored content of one product page.",
                json!({
                    "type": "object",
                    "properties": {
                        "url": { "type": "string", "description": "Product page URL" }
                    },
                    "required": ["url"]
                }),
            ),
        ]
    }

    /// Execute a tool call. `arguments` is the raw JSON string from the model.
    pub async fn call(&self, name: &str, arguments: &str) -> String {
        let args: Value = serde_json::from_str(arguments).unwrap_or_else(|_| json!({}));

        match name {
            SEARCH_PARTS_CONTENT => match string_arg(&args, "query") {
                Some(query) => self.search(query).await,
                None => format!("Error: {SEARCH_PARTS_CONTENT} requires a 'query' argument"),
            },
            LIST_PRODUCT_URLS => self.list_urls().await,
            GET_PAGE_CONTENT => match string_arg(&args, "url") {
                Some(url) => self.page_content(url).await,
                None => format!("Error: {GET_PAGE_CONTENT} requires a 'url' argument"),
            },
            other => format!("Error: unknown tool '{other}'"),
        }
    }

    async fn search(&self, query: &str) -> String {
        match self.knowledge.search(query).await {
            Ok(chunks) if chunks.is_empty() => "No relevant product content found.".to_string(),
            Ok(chunks) => chunks.join(MATCH_SEPARATOR),
            Err(e) => {
                tracing::warn!(name: "tool.search.failed", error = %format!("{e:#}"), "Vector search failed");
                format!("Error during vector search: {e:#}")
            }
        }
    }

    async fn list_urls(&self) -> String {
        let urls = match self.knowledge.list_urls().await {
            Ok(urls) => urls.into_iter().collect::<BTreeSet<_>>(),
            Err(e) => {
                tracing::warn!(name: "tool.list_urls.failed", error = %format!("{e:#}"), "Listing URLs failed");
                BTreeSet::new()
            }
        };
        serde_json::to_string(&urls).unwrap_or_else(|_| "[]".to_string())
    }

    async fn page_content(&self, url: &str) -> String {
        match self.knowledge.page_content(url).await {
            Ok(chunks) if chunks.is_empty() => format!("No content found for {url}"),
            Ok(chunks) => chunks.join("\n\n"),
            Err(e) => {
                tracing::warn!(name: "tool.page_content.failed", url = %url, error = %format!("{e:#}"), "Page lookup failed");
                format!("Error retrieving page content: {e:#}")
            }
        }
    }
}

fn function(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

fn string_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}
