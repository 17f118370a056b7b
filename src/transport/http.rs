//! HTTP implementation of [`RequestTransport`].

use std::time::Duration;

use url::Url;

use super::{AskRequest, AskResponse, RequestTransport, TransportError};

/// Posts ask requests to a fixed endpoint with `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport without a request timeout.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Create a transport whose requests fail after `timeout`.
    ///
    /// `None` leaves requests unbounded.
    pub fn with_timeout(endpoint: Url, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl RequestTransport for HttpTransport {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, TransportError> {
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;

        tracing::debug!(
            name: "transport.http.response",
            status = status.as_u16(),
            bytes = body.len(),
            "Ask endpoint responded"
        );

        // An error status still carries a usable `{error}` body if the
        // endpoint sent one.
        match serde_json::from_slice::<AskResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(TransportError::Status(status.as_u16())),
            Err(e) => Err(TransportError::Decode(e)),
        }
    }
}
