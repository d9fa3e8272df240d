use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::error::DiscoveryError;
use crate::models::{ApiResponse, HealthResponse, PageParams, RawFilters};
use crate::services::{AuthenticatedUser, DiscoveryFeed, DiscoveryService, PostgresClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<DiscoveryService>,
    pub postgres: Arc<PostgresClient>,
}

/// Configure all discovery routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/discover/top-matches", web::get().to(top_matches))
        .route("/discover/likes-you", web::get().to(likes_you));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let pg_healthy = match state.postgres.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Health check could not reach PostgreSQL: {}", e);
            false
        }
    };

    let status = if pg_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Ranked discovery candidates for the current user
///
/// GET /discover/top-matches?min_age=25&max_age=35&Ethnicity=asian,white&max_distance=50&sort=recent&offset=0&limit=50
///
/// Every filter is optional; malformed values are ignored rather than
/// rejected.
async fn top_matches(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    filters: web::Query<RawFilters>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, DiscoveryError> {
    discover(&state, user, DiscoveryFeed::TopMatches, filters, params).await
}

/// Same pipeline, restricted to candidates who already liked the user
///
/// GET /discover/likes-you
async fn likes_you(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    filters: web::Query<RawFilters>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, DiscoveryError> {
    discover(&state, user, DiscoveryFeed::LikesYou, filters, params).await
}

async fn discover(
    state: &AppState,
    AuthenticatedUser(user_id): AuthenticatedUser,
    feed: DiscoveryFeed,
    filters: web::Query<RawFilters>,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, DiscoveryError> {
    let (candidates, page) = state
        .discovery
        .discover(user_id, feed, filters.into_inner(), &params)
        .await?;

    let msg = if candidates.is_empty() {
        "No candidates found"
    } else {
        "Candidates fetched successfully"
    };

    Ok(HttpResponse::Ok().json(ApiResponse::ok(candidates, msg).with_pagination(page)))
}
