//! Object storage over HTTP.
//!
//! Objects are written with `PUT {endpoint}/{bucket}/{key}` and removed with
//! `DELETE`. The returned URL is built from the public base URL.

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{ArtifactPayload, ArtifactStore};
use crate::config::ArtifactConfig;
use crate::errors::ArtifactStoreError;

/// Artifact store talking to an object-storage REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpArtifactStore {
    client: reqwest::Client,
    endpoint: String,
    public_base_url: String,
    token: Option<String>,
}

impl HttpArtifactStore {
    /// Creates a store for `endpoint`, serving URLs from `config.base_url`.
    pub fn new(endpoint: impl Into<String>, config: &ArtifactConfig) -> Result<Self, ArtifactStoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            public_base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Sends `Authorization: Bearer {token}` with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn status_error(response: reqwest::Response, bucket: &str, key: &str) -> ArtifactStoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        ArtifactStoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else if status.is_client_error() {
        ArtifactStoreError::Rejected(format!("status {status}: {body}"))
    } else {
        ArtifactStoreError::Backend(anyhow::anyhow!("object storage returned status {status}: {body}"))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn upload(&self, bucket: &str, key: &str, payload: &ArtifactPayload) -> Result<String, ArtifactStoreError> {
        let request = self
            .client
            .put(self.object_url(bucket, key))
            .header("Content-Type", payload.content_type())
            .header("Content-MD5", payload.content_md5())
            .body(payload.bytes().to_vec());

        let response = self
            .authorize(request)
            .send()
            .await
            .context("failed to send upload request")?;

        if !response.status().is_success() {
            return Err(status_error(response, bucket, key).await);
        }

        debug!(bucket = %bucket, key = %key, size = payload.len(), "Uploaded artifact");
        Ok(format!("{}/{bucket}/{key}", self.public_base_url))
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ArtifactStoreError> {
        let response = self
            .authorize(self.client.delete(self.object_url(bucket, key)))
            .send()
            .await
            .context("failed to send delete request")?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response, bucket, key).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_joined_without_double_slash() {
        let config = ArtifactConfig::default().with_base_url("https://cdn.example.com/public/");
        let store = HttpArtifactStore::new("https://storage.example.com/object/", &config).unwrap();

        assert_eq!(
            store.object_url("fotos", "a/b.jpg"),
            "https://storage.example.com/object/fotos/a/b.jpg"
        );
        assert_eq!(store.public_base_url, "https://cdn.example.com/public");
    }
}
