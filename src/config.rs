use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::{Validate, ValidationError};

use crate::core::filters::UnknownTokenPolicy;
use crate::core::ranking::SortKey;
use crate::core::distance::DistanceUnit;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    /// Expected `aud` claim; unchecked when absent
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Base URL of the storage backend, e.g. `https://project.supabase.co`
    pub endpoint: String,
    pub service_key: Option<String>,
    pub bucket: String,
    /// Sign URLs over HTTP instead of building public object URLs
    #[serde(default)]
    pub signed_urls: bool,
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
    pub request_timeout_secs: Option<u64>,
}

fn default_signed_url_ttl() -> u64 { 3600 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: default_redis_url(),
            ttl_secs: None,
            l1_cache_size: None,
        }
    }
}

fn default_redis_url() -> String { "redis://127.0.0.1:6379".to_string() }

/// Tunables of the discovery pipeline, injected into the engine
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_page_sizes"))]
pub struct DiscoveryConfig {
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub default_page_size: usize,
    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub max_page_size: usize,
    /// Rows fetched from the store per round trip while filling a page
    #[serde(default = "default_store_batch_size")]
    #[validate(range(min = 1))]
    pub store_batch_size: usize,
    #[serde(default)]
    pub distance_unit: DistanceUnit,
    #[serde(default = "default_earth_radius_km")]
    #[validate(range(min = 6350.0, max = 6400.0))]
    pub earth_radius_km: f64,
    #[serde(default = "default_distance_decimals")]
    #[validate(range(max = 6))]
    pub distance_decimals: u32,
    #[serde(default)]
    pub default_sort: SortKey,
    #[serde(default)]
    pub unknown_token_policy: UnknownTokenPolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            store_batch_size: default_store_batch_size(),
            distance_unit: DistanceUnit::default(),
            earth_radius_km: default_earth_radius_km(),
            distance_decimals: default_distance_decimals(),
            default_sort: SortKey::default(),
            unknown_token_policy: UnknownTokenPolicy::default(),
        }
    }
}

fn default_page_size() -> usize { 50 }
fn default_max_page_size() -> usize { 100 }
fn default_store_batch_size() -> usize { 500 }
fn default_earth_radius_km() -> f64 { 6371.0 }
fn default_distance_decimals() -> u32 { 1 }

fn validate_page_sizes(config: &DiscoveryConfig) -> Result<(), ValidationError> {
    if config.default_page_size > config.max_page_size {
        return Err(ValidationError::new("default_page_size_exceeds_max"));
    }
    if config.store_batch_size < config.max_page_size {
        return Err(ValidationError::new("store_batch_smaller_than_page"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Default values in the structs
    /// 2. `config/default.toml`, then `config/local.toml`
    /// 3. Environment variables prefixed with `DISCOVERY__`
    ///    (e.g. `DISCOVERY__SERVER__PORT` -> server.port)
    /// 4. `DATABASE_URL` and `JWT_SECRET`
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        let settings = substitute_env_vars(settings)?;
        Self::finish(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        Self::finish(settings)
    }

    fn finish(settings: Config) -> Result<Self, ConfigError> {
        let settings: Settings = settings.try_deserialize()?;
        settings
            .discovery
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid discovery settings: {}", e)))?;
        Ok(settings)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("DISCOVERY")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Apply the conventional unprefixed variables used by the deployment
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        builder = builder.set_override("auth.jwt_secret", secret)?;
    }
    if let Ok(key) = env::var("STORAGE_SERVICE_KEY") {
        builder = builder.set_override("storage.service_key", key)?;
    }

    builder.build()
}
