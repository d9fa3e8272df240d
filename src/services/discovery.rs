use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::distance::round_to;
use crate::core::{DiscoveryEngine, DiscoveryRequest, ExclusionSet, InteractionLedger};
use crate::error::DiscoveryError;
use crate::models::{Candidate, CandidateView, PageInfo, PageParams, RawFilters};
use crate::services::{PostgresClient, StorageClient};

/// Which feed a request is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFeed {
    TopMatches,
    /// Only candidates who already liked the requester
    LikesYou,
}

impl DiscoveryFeed {
    fn label(self) -> &'static str {
        match self {
            Self::TopMatches => "top-matches",
            Self::LikesYou => "likes-you",
        }
    }
}

/// Orchestrates one discovery request end to end
///
/// Reads are fanned out against the store, the pure pipeline runs on the
/// joined data, and media references of the final page are resolved
/// concurrently. Nothing is written.
pub struct DiscoveryService {
    postgres: Arc<PostgresClient>,
    storage: Arc<StorageClient>,
    engine: DiscoveryEngine,
}

impl DiscoveryService {
    pub fn new(
        postgres: Arc<PostgresClient>,
        storage: Arc<StorageClient>,
        engine: DiscoveryEngine,
    ) -> Self {
        Self {
            postgres,
            storage,
            engine,
        }
    }

    pub fn engine(&self) -> &DiscoveryEngine {
        &self.engine
    }

    pub async fn discover(
        &self,
        requester_id: Uuid,
        feed: DiscoveryFeed,
        filters: RawFilters,
        params: &PageParams,
    ) -> Result<(Vec<CandidateView>, PageInfo), DiscoveryError> {
        let (requester, saved_filters, blocks, interactions) = tokio::try_join!(
            self.postgres.get_profile(requester_id),
            self.postgres.get_filter_preferences(requester_id),
            self.postgres.get_blocks(requester_id),
            self.postgres.get_interactions(requester_id),
        )?;

        let requester = requester.ok_or(DiscoveryError::ProfileNotFound(requester_id))?;

        let raw = match saved_filters {
            Some(saved) => saved.overlay(filters),
            None => filters,
        };
        let filter = self.engine.normalize(&raw);

        let ledger = InteractionLedger::from_records(&interactions);
        let exclusions = ExclusionSet::build(requester_id, &blocks, &ledger);
        let stats = exclusions.stats();

        let request = DiscoveryRequest {
            requester: &requester,
            filter: &filter,
            exclusions: &exclusions,
            ledger: &ledger,
            sort: self.engine.sort_key(params),
            page: self.engine.page(params),
            liked_me_only: feed == DiscoveryFeed::LikesYou,
            today: today(),
        };
        let query = self.engine.candidate_query(&request);

        // Rows come back eligible and in feed order; only the prefix up to
        // the end of the requested window is loaded.
        let batch_size = self.engine.config().store_batch_size.max(1);
        let wanted = request.page.offset.saturating_add(request.page.limit);
        let (total, first) = tokio::try_join!(
            self.postgres.count_candidates(&query),
            self.postgres.query_candidates(&query, 0, batch_size),
        )?;

        let mut fetched = first.len();
        let mut full_batch = fetched == batch_size;
        let mut eligible = self.engine.select(&request, first);
        while full_batch && eligible.len() < wanted {
            let batch = self
                .postgres
                .query_candidates(&query, fetched, batch_size)
                .await?;
            fetched += batch.len();
            full_batch = batch.len() == batch_size;
            eligible.extend(self.engine.select(&request, batch));
        }

        let page = self.engine.order(&request, eligible, total);

        tracing::info!(
            "Discovery {} for {}: filters={}, excluded={}, blocked={}, decided={}, mutual={}, fetched={}, eligible={}, returned={}",
            feed.label(),
            requester_id,
            filter.active_count(),
            exclusions.len(),
            stats.blocked,
            stats.decided,
            stats.mutual,
            fetched,
            page.info.total,
            page.candidates.len()
        );

        let decimals = self.engine.config().distance_decimals;
        let views = join_all(page.candidates.into_iter().map(|c| self.present(c, decimals))).await;

        Ok((views, page.info))
    }

    async fn present(&self, candidate: Candidate, decimals: u32) -> CandidateView {
        let profile_image = candidate.profile.profile_image.clone();
        let (profile_image_url, photo_urls) = tokio::join!(
            async {
                match profile_image.as_deref() {
                    Some(reference) => self.storage.resolve_url(reference).await,
                    None => None,
                }
            },
            self.storage.resolve_all(&candidate.profile.photos),
        );

        to_view(candidate, decimals, profile_image_url, photo_urls)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Public projection of a ranked candidate
pub fn to_view(
    candidate: Candidate,
    decimals: u32,
    profile_image_url: Option<String>,
    photo_urls: Vec<String>,
) -> CandidateView {
    let Candidate {
        profile,
        age,
        distance_km,
        has_liked_me,
    } = candidate;

    CandidateView {
        id: profile.user_id,
        first_name: profile.first_name,
        age,
        gender: profile.gender,
        city: profile.city,
        state: profile.state,
        height_inches: profile.height_inches,
        body_type: profile.body_type,
        ethnicity: profile.ethnicity,
        religion: profile.religion,
        education: profile.education,
        smoking: profile.smoking,
        drinking: profile.drinking,
        marijuana: profile.marijuana,
        have_children: profile.have_children,
        want_children: profile.want_children,
        zodiac: profile.zodiac,
        interests: profile.interests,
        bio: profile.bio,
        is_verified: profile.is_verified,
        distance_in_km: distance_km.map(|d| round_to(d, decimals)),
        has_liked_me,
        profile_image_url,
        photo_urls,
    }
}
