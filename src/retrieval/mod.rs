//! Product knowledge the assistant retrieves before answering.
//!
//! Scraped PartSelect pages are stored as chunks (`url`, `content`,
//! `embedding`) in a `partselect_chunks` table. [`PartsKnowledge`] is the
//! read side the agent's tools need; [`SupabaseKnowledge`] implements it over
//! Supabase's REST API.

mod supabase;

pub use supabase::SupabaseKnowledge;

/// Embedding model used when `EMBEDDING_MODEL` is not set.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Chunks returned per semantic search.
pub const DEFAULT_MATCH_COUNT: usize = 5;

/// Where the product chunks live.
#[derive(Clone)]
pub struct RetrievalSettings {
    /// Supabase project URL, e.g. `https://xyz.supabase.co`.
    pub supabase_url: String,
    /// Service role key, sent as `apikey` and bearer token.
    pub service_key: String,
    pub embedding_model: String,
    pub match_count: usize,
}

impl std::fmt::Debug for RetrievalSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalSettings")
            .field("supabase_url", &self.supabase_url)
            .field("service_key", &"<redacted>")
            .field("embedding_model", &self.embedding_model)
            .field("match_count", &self.match_count)
            .finish()
    }
}

/// Read access to stored product chunks.
#[async_trait::async_trait]
pub trait PartsKnowledge: Send + Sync {
    /// Contents of the chunks most similar to `query`, best match first.
    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>>;

    /// The `url` of every stored chunk, duplicates included.
    async fn list_urls(&self) -> anyhow::Result<Vec<String>>;

    /// Contents of every chunk stored for `url`.
    async fn page_content(&self, url: &str) -> anyhow::Result<Vec<String>>;
}
