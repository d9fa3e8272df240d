use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use discovery_engine::config::{LoggingSettings, Settings};
use discovery_engine::core::DiscoveryEngine;
use discovery_engine::error::handle_query_payload_error;
use discovery_engine::routes::{self, AppState};
use discovery_engine::services::cache::effective_ttl;
use discovery_engine::services::{
    CacheManager, DiscoveryService, PostgresClient, StorageClient, TokenVerifier,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    match settings.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "compact" => subscriber.compact().init(),
        _ => subscriber.json().init(),
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(io_error("Configuration error", e));
        }
    };

    init_logging(&settings.logging);

    info!("Starting discovery engine...");

    // Media URL cache is optional; the service runs without it
    let cache = if settings.cache.enabled {
        let configured = settings.cache.ttl_secs.unwrap_or(300);
        let signed_ttl = settings.storage.signed_url_ttl_secs;
        let l1_size = settings.cache.l1_cache_size.unwrap_or(1000);

        let ttl = effective_ttl(configured, signed_ttl);
        if ttl < configured {
            warn!(
                "Cache TTL {}s clipped to {}s to stay inside the signed URL lifetime {}s",
                configured, ttl, signed_ttl
            );
        }

        match CacheManager::new(&settings.cache.redis_url, l1_size, configured, signed_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_size, ttl);
                Some(Arc::new(c))
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), running without media cache", e);
                None
            }
        }
    } else {
        None
    };

    let storage = Arc::new(
        StorageClient::new(&settings.storage, cache)
            .map_err(|e| io_error("Storage client error", e))?,
    );

    let postgres = match PostgresClient::from_settings(&settings.database).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to connect to PostgreSQL: {}", e);
            return Err(io_error("PostgreSQL connection error", e));
        }
    };

    info!(
        "PostgreSQL client initialized (max: {} connections)",
        settings.database.max_connections.unwrap_or(10)
    );

    let engine = DiscoveryEngine::new(settings.discovery.clone());
    info!("Discovery engine initialized: {:?}", engine.config());

    let app_state = AppState {
        discovery: Arc::new(DiscoveryService::new(postgres.clone(), storage, engine)),
        postgres,
    };
    let verifier = web::Data::new(TokenVerifier::new(&settings.auth));

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(verifier.clone())
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
