use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::DatabaseSettings;
use crate::core::SortKey;
use crate::models::{Block, CandidateQuery, Coordinates, Interaction, Profile, RawFilters};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

const PROFILE_SELECT: &str = r#"
    SELECT
        p.user_id, u.status, p.first_name, p.gender, p.preference, p.date_of_birth,
        p.latitude, p.longitude, p.city, p.state, p.height_inches, p.body_type,
        p.ethnicity, p.religion, p.education, p.smoking, p.drinking, p.marijuana,
        p.have_children, p.want_children, p.zodiac, p.interests, p.bio,
        p.profile_image, p.photos, p.is_verified, p.profile_hidden,
        p.can_start_matching, p.created_at, p.last_active_at
    FROM profiles p
    JOIN users u ON u.id = p.user_id
"#;

/// Read-only PostgreSQL access for the discovery pipeline
///
/// All reads go to the primary so block records are visible to the very
/// next request after they are written.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings, running migrations
    /// when enabled
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        let client = Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
        )
        .await?;

        if settings.run_migrations {
            sqlx::migrate!("./migrations").run(&client.pool).await?;
            tracing::info!("Database migrations applied");
        }

        Ok(client)
    }

    /// Build a client whose pool connects on first use
    pub fn connect_lazy(database_url: &str) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Profile of a single user joined with the account status
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, PostgresError> {
        let query = format!("{PROFILE_SELECT} WHERE p.user_id = $1");

        let profile = sqlx::query_as::<_, Profile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    /// Persisted filter overrides of a user, if any were saved
    pub async fn get_filter_preferences(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RawFilters>, PostgresError> {
        let query = r#"
            SELECT filters
            FROM filter_preferences
            WHERE user_id = $1
        "#;

        let filters = sqlx::query_scalar::<_, Json<RawFilters>>(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(filters.map(|Json(filters)| filters))
    }

    /// Every block the user is a party to, in either direction
    pub async fn get_blocks(&self, user_id: Uuid) -> Result<Vec<Block>, PostgresError> {
        let query = r#"
            SELECT blocker_id, blocked_id, created_at
            FROM blocks
            WHERE blocker_id = $1 OR blocked_id = $1
        "#;

        let blocks = sqlx::query_as::<_, Block>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("User {} is party to {} blocks", user_id, blocks.len());

        Ok(blocks)
    }

    /// Every interaction the user sent or received
    pub async fn get_interactions(&self, user_id: Uuid) -> Result<Vec<Interaction>, PostgresError> {
        let query = r#"
            SELECT user_id, target_user_id, action, created_at, is_unmatched
            FROM interactions
            WHERE user_id = $1 OR target_user_id = $1
        "#;

        let interactions = sqlx::query_as::<_, Interaction>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!("User {} has {} interaction records", user_id, interactions.len());

        Ok(interactions)
    }

    /// One batch of eligible candidates in feed order
    pub async fn query_candidates(
        &self,
        query: &CandidateQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Profile>, PostgresError> {
        let mut builder = QueryBuilder::<Postgres>::new(PROFILE_SELECT);
        push_predicates(&mut builder, query);
        push_order(&mut builder, query);
        builder
            .push(" LIMIT ")
            .push_bind(to_i64(limit))
            .push(" OFFSET ")
            .push_bind(to_i64(offset));

        let profiles = builder
            .build_query_as::<Profile>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            "Queried {} candidates for {} at offset {} ({} excluded ids)",
            profiles.len(),
            query.requester_id,
            offset,
            query.exclude_user_ids.len()
        );

        Ok(profiles)
    }

    /// Size of the whole eligible set
    pub async fn count_candidates(&self, query: &CandidateQuery) -> Result<usize, PostgresError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM profiles p JOIN users u ON u.id = p.user_id",
        );
        push_predicates(&mut builder, query);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// WHERE clause shared by the batch and count queries. Mirrors
/// `eligibility::check` and `distance::evaluate` row for row.
fn push_predicates(builder: &mut QueryBuilder<'_, Postgres>, query: &CandidateQuery) {
    let filter = &query.filter;

    builder.push(
        " WHERE u.status = 'active' AND p.profile_hidden = FALSE AND p.can_start_matching = TRUE",
    );
    builder
        .push(" AND canonical_token(p.gender) = ANY(")
        .push_bind(query.preferred_genders.clone())
        .push(")");
    builder
        .push(" AND EXISTS (SELECT 1 FROM unnest(p.preference) AS g WHERE canonical_token(g) = ")
        .push_bind(query.requester_gender.clone())
        .push(")");
    builder
        .push(" AND p.user_id <> ALL(")
        .push_bind(query.exclude_user_ids.clone())
        .push(")");

    if let Some(dob) = query.born_on_or_before {
        builder.push(" AND p.date_of_birth <= ").push_bind(dob);
    }
    if let Some(dob) = query.born_after {
        builder.push(" AND p.date_of_birth > ").push_bind(dob);
    }
    if let Some(min) = filter.min_height_inches {
        builder.push(" AND p.height_inches >= ").push_bind(min);
    }
    if let Some(max) = filter.max_height_inches {
        builder.push(" AND p.height_inches <= ").push_bind(max);
    }

    for (column, wanted) in [
        ("body_type", &filter.body_type),
        ("religion", &filter.religion),
        ("education", &filter.education),
        ("drinking", &filter.drinking),
        ("smoking", &filter.smoking),
        ("marijuana", &filter.marijuana),
        ("have_children", &filter.have_children),
        ("want_children", &filter.want_children),
    ] {
        if let Some(token) = wanted {
            builder
                .push(format!(" AND canonical_token(p.{column}) = "))
                .push_bind(token.clone());
        }
    }
    if let Some(ethnicity) = &filter.ethnicity {
        builder
            .push(" AND EXISTS (SELECT 1 FROM unnest(p.ethnicity) AS e WHERE canonical_token(e) = ANY(")
            .push_bind(ethnicity.iter().cloned().collect::<Vec<String>>())
            .push("))");
    }
    if let Some(zodiac) = &filter.zodiac {
        builder
            .push(" AND canonical_token(p.zodiac) = ANY(")
            .push_bind(zodiac.iter().cloned().collect::<Vec<String>>())
            .push(")");
    }

    if let (Some(origin), Some(max_km)) = (query.origin, filter.max_distance_km) {
        if let Some(bbox) = query.bounding_box {
            builder
                .push(" AND p.latitude BETWEEN ")
                .push_bind(bbox.min_lat)
                .push(" AND ")
                .push_bind(bbox.max_lat)
                .push(" AND p.longitude BETWEEN ")
                .push_bind(bbox.min_lon)
                .push(" AND ")
                .push_bind(bbox.max_lon);
        }
        builder.push(" AND ");
        push_distance(builder, origin, query.earth_radius_km);
        builder.push(" <= ").push_bind(max_km);
    }

    if query.liked_me_only {
        builder
            .push(" AND p.user_id = ANY(")
            .push_bind(query.admirer_ids.clone())
            .push(")");
    }
}

/// Haversine distance in km, NULL for rows without valid coordinates
fn push_distance(builder: &mut QueryBuilder<'_, Postgres>, origin: Coordinates, radius_km: f64) {
    builder
        .push(
            "(CASE WHEN p.latitude BETWEEN -90 AND 90 AND p.longitude BETWEEN -180 AND 180 THEN 2 * ",
        )
        .push_bind(radius_km)
        .push(" * asin(LEAST(1, sqrt(power(sin(radians(p.latitude - ")
        .push_bind(origin.latitude)
        .push(") / 2), 2) + cos(radians(")
        .push_bind(origin.latitude)
        .push(")) * cos(radians(p.latitude)) * power(sin(radians(p.longitude - ")
        .push_bind(origin.longitude)
        .push(") / 2), 2)))) END)");
}

/// ORDER BY matching `sort_candidates`, user ID last
fn push_order(builder: &mut QueryBuilder<'_, Postgres>, query: &CandidateQuery) {
    const RECENCY: &str = "GREATEST(p.created_at, COALESCE(p.last_active_at, p.created_at)) DESC, ";

    builder.push(" ORDER BY ");
    match (query.sort, query.origin) {
        (SortKey::Recent, _) => {
            builder.push(RECENCY);
        }
        (SortKey::Distance, Some(origin)) => {
            push_distance(builder, origin, query.earth_radius_km);
            builder.push(" ASC NULLS LAST, ");
        }
        // No distances to compare; only the tiebreak applies
        (SortKey::Distance, None) => {}
        (SortKey::LikedMe, _) => {
            builder
                .push("(p.user_id = ANY(")
                .push_bind(query.admirer_ids.clone())
                .push(")) DESC, ")
                .push(RECENCY);
        }
    }
    builder.push("p.user_id ASC");
}
