//! [`PartsKnowledge`] over Supabase's PostgREST API.

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use super::{PartsKnowledge, RetrievalSettings};
use crate::llm::EmbeddingsClient;

const CHUNKS_TABLE: &str = "partselect_chunks";
const MATCH_FUNCTION: &str = "match_partselect_chunks";

#[derive(Deserialize)]
struct ContentRow {
    content: String,
}

#[derive(Deserialize)]
struct UrlRow {
    url: String,
}

/// Reads product chunks from a Supabase project.
#[derive(Clone)]
pub struct SupabaseKnowledge {
    http: reqwest::Client,
    settings: RetrievalSettings,
    embeddings: EmbeddingsClient,
}

impl std::fmt::Debug for SupabaseKnowledge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseKnowledge")
            .field("settings", &self.settings)
            .field("embeddings", &self.embeddings)
            .finish()
    }
}

impl SupabaseKnowledge {
    #[must_use]
    pub fn new(settings: RetrievalSettings, embeddings: EmbeddingsClient) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            embeddings,
        }
    }

    fn rest_url(&self, path: &str) -> anyhow::Result<Url> {
        let base = self.settings.supabase_url.trim_end_matches('/');
        Url::parse(&format!("{base}/rest/v1/{path}"))
            .with_context(|| format!("invalid Supabase URL '{base}'"))
    }

    fn authorized(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.header("apikey", &self.settings.service_key)
            .bearer_auth(&self.settings.service_key)
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        rb: reqwest::RequestBuilder,
    ) -> anyhow::Result<Vec<T>> {
        let rows = self
            .authorized(rb)
            .send()
            .await
            .context("Supabase request failed")?
            .error_for_status()?
            .json::<Option<Vec<T>>>()
            .await
            .context("malformed Supabase response")?;
        Ok(rows.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl PartsKnowledge for SupabaseKnowledge {
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let embedding = self.embeddings.embed(query).await?;
        let url = self.rest_url(&format!("rpc/{MATCH_FUNCTION}"))?;

        let body = serde_json::json!({
            "query_embedding": embedding,
            "match_count": self.settings.match_count,
        });

        let rows: Vec<ContentRow> = self.fetch(self.http.post(url).json(&body)).await?;
        tracing::debug!(
            name: "retrieval.search",
            matches = rows.len(),
            "Semantic search finished"
        );
        Ok(rows.into_iter().map(|r| r.content).collect())
    }

    async fn list_urls(&self) -> anyhow::Result<Vec<String>> {
        let mut url = self.rest_url(CHUNKS_TABLE)?;
        url.query_pairs_mut().append_pair("select", "url");

        let rows: Vec<UrlRow> = self.fetch(self.http.get(url)).await?;
        Ok(rows.into_iter().map(|r| r.url).collect())
    }

    async fn page_content(&self, page_url: &str) -> anyhow::Result<Vec<String>> {
        let mut url = self.rest_url(CHUNKS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "content")
            .append_pair("url", &format!("eq.{page_url}"));

        let rows: Vec<ContentRow> = self.fetch(self.http.get(url)).await?;
        Ok(rows.into_iter().map(|r| r.content).collect())
    }
}
