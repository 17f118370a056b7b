//! `OpenAI` embeddings API client.

use anyhow::{Context, anyhow};
use serde::Deserialize;

use super::LlmSettings;

#[derive(Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Turns text into vectors for semantic search.
#[derive(Clone)]
pub struct EmbeddingsClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    api_key_header: bool,
    model: String,
}

impl std::fmt::Debug for EmbeddingsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingsClient")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish()
    }
}

impl EmbeddingsClient {
    /// Create a client that reuses the LLM endpoint and credentials.
    #[must_use]
    pub fn new(settings: &LlmSettings, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            http: reqwest::Client::new(),
            url: settings
                .provider
                .build_embeddings_url(&settings.base_url, &model),
            api_key: settings.api_key.clone(),
            api_key_header: settings.provider.uses_api_key_header(),
            model,
        }
    }

    /// Embed a single piece of text.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply carries no vector.
    pub async fn embed(&self, input: &str) -> anyhow::Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let mut rb = self.http.post(&self.url).json(&body);
        if let Some(k) = &self.api_key {
            rb = if self.api_key_header {
                rb.header("api-key", k)
            } else {
                rb.bearer_auth(k)
            };
        }

        let resp = rb
            .send()
            .await
            .context("embeddings request failed")?
            .error_for_status()?;
        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .context("malformed embeddings response")?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("embeddings response had no data"))
    }
}
