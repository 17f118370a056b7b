//! Provider-specific URL layout and authentication.

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// Generic OpenAI-compatible provider (`OpenRouter`, Groq, local servers, ...)
    Generic,
}

/// API version used for Azure when none is configured.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

impl Provider {
    /// Detect provider from base URL.
    ///
    /// Azure detection leaves `deployment_name` empty; the caller fills it in
    /// from configuration.
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openai.azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("api.openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
            ),
            _ => format!("{base}/v1/chat/completions"),
        }
    }

    /// Build the embeddings URL for this provider.
    ///
    /// On Azure the embedding model name doubles as its deployment name.
    #[must_use]
    pub fn build_embeddings_url(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI { api_version, .. } => format!(
                "{base}/openai/deployments/{model}/embeddings?api-version={api_version}"
            ),
            _ => format!("{base}/v1/embeddings"),
        }
    }

    /// Azure expects the key in an `api-key` header rather than a bearer token.
    #[must_use]
    pub fn uses_api_key_header(&self) -> bool {
        matches!(self, Self::AzureOpenAI { .. })
    }
}
