use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::StorageSettings;
use crate::services::cache::{CacheKey, CacheManager};

/// Errors that can occur when talking to the storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

/// Resolves stored media references into fetchable URLs
///
/// References are object paths inside the configured bucket. Absolute
/// `http(s)` references are returned untouched. Depending on settings the
/// URL is either the public object URL (no I/O) or a signed URL obtained
/// from the storage API, optionally cached.
pub struct StorageClient {
    base_url: String,
    service_key: Option<String>,
    bucket: String,
    signed_urls: bool,
    signed_url_ttl_secs: u64,
    client: Client,
    cache: Option<Arc<CacheManager>>,
}

impl StorageClient {
    pub fn new(
        settings: &StorageSettings,
        cache: Option<Arc<CacheManager>>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.unwrap_or(10)))
            .build()?;

        Ok(Self {
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            service_key: settings.service_key.clone(),
            bucket: settings.bucket.clone(),
            signed_urls: settings.signed_urls,
            signed_url_ttl_secs: settings.signed_url_ttl_secs,
            client,
            cache,
        })
    }

    /// Resolve one reference; failures are logged and yield `None`
    pub async fn resolve_url(&self, reference: &str) -> Option<String> {
        match self.try_resolve(reference).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Failed to resolve media reference {}: {}", reference, e);
                None
            }
        }
    }

    /// Resolve several references concurrently, keeping order and dropping
    /// the ones that could not be resolved
    pub async fn resolve_all(&self, references: &[String]) -> Vec<String> {
        join_all(references.iter().map(|r| self.resolve_url(r)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn try_resolve(&self, reference: &str) -> Result<Option<String>, StorageError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(None);
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Ok(Some(reference.to_string()));
        }

        let path = self.object_path(reference);
        if path.is_empty() {
            return Ok(None);
        }
        if !self.signed_urls {
            return Ok(Some(self.public_url(&path)));
        }

        let key = CacheKey::media_url(&self.bucket, &path);
        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(url)) => return Ok(Some(url)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Media URL cache read failed: {}", e),
            }
        }

        let url = self.sign(&path).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(&key, &url).await {
                tracing::warn!("Failed to cache signed URL: {}", e);
            }
        }

        Ok(Some(url))
    }

    /// Object path relative to the bucket, percent-encoded per segment
    fn object_path(&self, reference: &str) -> String {
        let trimmed = reference.trim_start_matches('/');
        let relative = trimmed
            .strip_prefix(&format!("{}/", self.bucket))
            .unwrap_or(trimmed);

        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    async fn sign(&self, path: &str) -> Result<String, StorageError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, self.bucket, path
        );

        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "expiresIn": self.signed_url_ttl_secs }));
        if let Some(key) = &self.service_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(StorageError::ApiError(format!(
                "Failed to sign {}: {}",
                path,
                response.status()
            )));
        }

        let body: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(format!("Failed to parse signed URL: {}", e)))?;

        if body.signed_url.starts_with("http://") || body.signed_url.starts_with("https://") {
            Ok(body.signed_url)
        } else {
            Ok(format!(
                "{}/storage/v1/{}",
                self.base_url,
                body.signed_url.trim_start_matches('/')
            ))
        }
    }
}
