use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Seconds a cached signed URL must still be valid for when handed out
pub const SIGNED_URL_MARGIN_SECS: u64 = 60;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

/// Two-tier cache of resolved media URLs
///
/// L1 is an in-process `moka` cache, L2 is Redis shared across instances.
/// Entries expire before the URLs they hold do; discovery results
/// themselves are never cached.
pub struct CacheManager {
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    l1_cache: moka::future::Cache<String, String>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a cache whose entries live `ttl_secs`, clipped to the
    /// signing lifetime by [`effective_ttl`]
    pub async fn new(
        redis_url: &str,
        l1_size: u64,
        ttl_secs: u64,
        signed_url_ttl_secs: u64,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        let ttl_secs = effective_ttl(ttl_secs, signed_url_ttl_secs);

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            l1_cache,
            ttl_secs,
        })
    }

    /// Cached URL for `key` (L1 first, then L2)
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(url) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(url));
        }

        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        match value {
            Some(url) => {
                tracing::trace!("L2 cache hit: {}", key);
                self.l1_cache.insert(key.to_string(), url.clone()).await;
                Ok(Some(url))
            }
            None => {
                tracing::trace!("Cache miss: {}", key);
                Ok(None)
            }
        }
    }

    /// Store a URL in both tiers
    pub async fn set(&self, key: &str, url: &str) -> Result<(), CacheError> {
        self.l1_cache.insert(key.to_string(), url.to_string()).await;

        let mut conn = self.redis.lock().await;
        redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(url)
            .query_async::<()>(&mut *conn)
            .await?;
        drop(conn);

        tracing::trace!("Cache set: {} ({}s)", key, self.ttl_secs);
        Ok(())
    }
}

/// Entry lifetime: the configured TTL, but never past the point where a
/// cached signed URL has less than [`SIGNED_URL_MARGIN_SECS`] left
pub fn effective_ttl(configured_secs: u64, signed_url_ttl_secs: u64) -> u64 {
    configured_secs
        .min(signed_url_ttl_secs.saturating_sub(SIGNED_URL_MARGIN_SECS))
        .max(1)
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a resolved media URL
    pub fn media_url(bucket: &str, reference: &str) -> String {
        format!("media:{}:{}", bucket, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get() {
        let cache = CacheManager::new("redis://127.0.0.1:6379", 1000, 60, 3600)
            .await
            .expect("Failed to create cache");

        let key = CacheKey::media_url("avatars", "test/a.jpg");
        let url = "https://storage.test/a.jpg?token=abc";

        cache.set(&key, url).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(url));

        let missing = CacheKey::media_url("avatars", &uuid::Uuid::new_v4().to_string());
        assert_eq!(cache.get(&missing).await.unwrap(), None);
    }

    #[test]
    fn test_effective_ttl_stays_inside_signing_lifetime() {
        assert_eq!(effective_ttl(300, 3600), 300);
        assert_eq!(effective_ttl(3600, 3600), 3540);
        assert_eq!(effective_ttl(7200, 600), 540);
        assert_eq!(effective_ttl(300, 30), 1);
        assert_eq!(effective_ttl(0, 3600), 1);
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::media_url("avatars", "u1/a.jpg"), "media:avatars:u1/a.jpg");
    }
}
