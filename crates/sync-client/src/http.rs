//! HTTP implementation of the indexing client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::error::ClientError;
use crate::request::IndexRequest;
use crate::IndexingClient;

/// Configuration for the HTTP indexing client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL of the indexing API (e.g. "http://localhost:8080").
    pub base_url: String,

    /// Bearer token, if the API requires one.
    pub api_token: Option<SecretString>,

    /// Per-request timeout. A timeout counts as a retryable failure.
    pub timeout: Duration,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reqwest-backed client for the ingest/delete contract.
pub struct HttpIndexingClient {
    client: Client,
    config: HttpClientConfig,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    id: &'a str,
}

impl HttpIndexingClient {
    /// Build a client with the configured timeout.
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Terminal {
                status: None,
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        is_delete: bool,
    ) -> Result<(), ClientError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);

        let mut builder = self.client.post(&url).json(body);
        if let Some(token) = &self.config.api_token {
            builder = builder.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let response = builder
            .send()
            .await
            // Connection refused, DNS failure, timeout: all retryable.
            .map_err(|e| ClientError::Retryable(e.to_string()))?;

        let status = response.status().as_u16();
        let body = if response.status().is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        match ClientError::from_status(status, is_delete, body) {
            None => {
                debug!(url = %url, status = status, "Delivered indexing request");
                Ok(())
            }
            Some(err) => Err(err),
        }
    }
}

#[async_trait]
impl IndexingClient for HttpIndexingClient {
    async fn deliver(&self, request: &IndexRequest) -> Result<(), ClientError> {
        match request {
            IndexRequest::Upsert(upsert) => self.post("/ingest", upsert, false).await,
            IndexRequest::Delete { id } => {
                self.post("/delete", &DeleteBody { id }, true).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::UpsertRequest;
    use std::collections::HashMap;

    #[test]
    fn test_config_builder() {
        let config = HttpClientConfig::new("http://localhost:8080/")
            .with_token("secret")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.base_url, "http://localhost:8080/");
        assert!(config.api_token.is_some());
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        // Nothing listens on this port.
        let client = HttpIndexingClient::new(
            HttpClientConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_millis(500)),
        )
        .unwrap();

        let request = IndexRequest::Upsert(UpsertRequest {
            id: "doc-1".into(),
            text: "text".into(),
            metadata: HashMap::new(),
        });

        let err = client.deliver(&request).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
