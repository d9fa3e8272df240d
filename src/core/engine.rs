use chrono::{Months, NaiveDate};

use crate::config::DiscoveryConfig;
use crate::core::{
    annotator::annotate_liked_me,
    distance::{self, calculate_bounding_box, DistanceVerdict},
    eligibility::{self, Rejection},
    exclusion::ExclusionSet,
    filters::{canonical_token, DiscoveryFilter, FilterNormalizer},
    interactions::InteractionLedger,
    ranking::{paginate, sort_candidates, DiscoveryPage, PageRequest, SortKey},
};
use crate::models::{Candidate, CandidateQuery, PageParams, Profile, RawFilters};

/// Everything the pure pipeline needs about one request
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryRequest<'a> {
    pub requester: &'a Profile,
    pub filter: &'a DiscoveryFilter,
    pub exclusions: &'a ExclusionSet,
    pub ledger: &'a InteractionLedger,
    pub sort: SortKey,
    pub page: PageRequest,
    /// Restrict the feed to candidates who already liked the requester
    pub liked_me_only: bool,
    /// Reference date for age computation
    pub today: NaiveDate,
}

#[derive(Debug, Default)]
struct StageCounts {
    excluded: usize,
    not_discoverable: usize,
    preference_mismatch: usize,
    filtered: usize,
    too_far: usize,
    not_liked: usize,
}

/// Candidate selection and ranking pipeline
///
/// # Pipeline Stages
/// 1. Eligibility (exclusions, account state, bidirectional preference, filters)
/// 2. Distance evaluation and max-distance filter
/// 3. Mutual-interest annotation
/// 4. Sort and paginate
///
/// The store runs the same predicates first (see [`DiscoveryEngine::candidate_query`]);
/// stages 1 to 3 re-check every row it returns. The engine holds only
/// configuration; every call is independent.
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    normalizer: FilterNormalizer,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig) -> Self {
        let normalizer = FilterNormalizer::new(config.unknown_token_policy, config.distance_unit);
        Self { config, normalizer }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn normalize(&self, raw: &RawFilters) -> DiscoveryFilter {
        self.normalizer.normalize(raw)
    }

    /// Sort key from the request, falling back to the configured default
    pub fn sort_key(&self, params: &PageParams) -> SortKey {
        params
            .sort
            .as_deref()
            .and_then(SortKey::parse)
            .unwrap_or(self.config.default_sort)
    }

    pub fn page(&self, params: &PageParams) -> PageRequest {
        PageRequest::clamped(params.offset(), params.limit(), &self.config)
    }

    /// Store-side predicates and ordering for a request
    pub fn candidate_query(&self, request: &DiscoveryRequest<'_>) -> CandidateQuery {
        let requester = request.requester;
        let filter = request.filter;
        let origin = requester.coordinates();

        let bounding_box = match (filter.max_distance_km, origin) {
            (Some(radius), Some(origin)) => Some(calculate_bounding_box(
                origin.latitude,
                origin.longitude,
                radius,
            )),
            _ => None,
        };

        // age >= n  <=>  born on or before today minus n years
        // age <= n  <=>  born after today minus n + 1 years
        // Any age bound also drops unknown and future birth dates.
        let age_bounded = filter.min_age.is_some() || filter.max_age.is_some();
        let born_on_or_before = age_bounded
            .then(|| years_before(request.today, filter.min_age.unwrap_or(0)))
            .flatten();
        let born_after = filter
            .max_age
            .and_then(|age| years_before(request.today, age.saturating_add(1)));

        CandidateQuery {
            requester_id: requester.user_id,
            requester_gender: canonical_token(&requester.gender),
            preferred_genders: requester.preference.iter().map(|g| canonical_token(g)).collect(),
            exclude_user_ids: request.exclusions.to_vec(),
            born_on_or_before,
            born_after,
            filter: filter.clone(),
            origin,
            earth_radius_km: self.config.earth_radius_km,
            bounding_box,
            sort: request.sort,
            admirer_ids: request.ledger.admirers(requester.user_id).collect(),
            liked_me_only: request.liked_me_only,
        }
    }

    /// Stages 1 to 3 over one batch of store rows, in input order
    pub fn select(&self, request: &DiscoveryRequest<'_>, pool: Vec<Profile>) -> Vec<Candidate> {
        let pool_size = pool.len();
        let mut counts = StageCounts::default();

        let origin = request.requester.coordinates();
        if origin.is_none() && request.filter.max_distance_km.is_some() {
            tracing::warn!(
                "Requester {} has no location, skipping max distance filter",
                request.requester.user_id
            );
        }

        let mut candidates: Vec<Candidate> = Vec::with_capacity(pool_size);
        for profile in pool {
            // Stage 1: eligibility
            let age = match eligibility::check(
                request.requester,
                &profile,
                request.exclusions,
                request.filter,
                request.today,
            ) {
                Ok(age) => age,
                Err(rejection) => {
                    match rejection {
                        Rejection::Excluded => counts.excluded += 1,
                        Rejection::NotDiscoverable => counts.not_discoverable += 1,
                        Rejection::PreferenceMismatch => counts.preference_mismatch += 1,
                        Rejection::Filtered => counts.filtered += 1,
                    }
                    continue;
                }
            };

            // Stage 2: distance
            match distance::evaluate(
                origin,
                profile.coordinates(),
                request.filter.max_distance_km,
                self.config.earth_radius_km,
            ) {
                DistanceVerdict::Keep(distance_km) => candidates.push(Candidate {
                    profile,
                    age,
                    distance_km,
                    has_liked_me: false,
                }),
                DistanceVerdict::Drop => counts.too_far += 1,
            }
        }

        // Stage 3: annotation
        annotate_liked_me(&mut candidates, request.requester.user_id, request.ledger);
        if request.liked_me_only {
            let before = candidates.len();
            candidates.retain(|c| c.has_liked_me);
            counts.not_liked = before - candidates.len();
        }

        tracing::debug!(
            "Checked {} rows for {}: excluded={}, hidden={}, preference={}, filtered={}, distance={}, not_liked={}, eligible={}",
            pool_size,
            request.requester.user_id,
            counts.excluded,
            counts.not_discoverable,
            counts.preference_mismatch,
            counts.filtered,
            counts.too_far,
            counts.not_liked,
            candidates.len()
        );

        candidates
    }

    /// Stage 4 over a prefix of the eligible set whose full size is `total`
    pub fn order(
        &self,
        request: &DiscoveryRequest<'_>,
        mut candidates: Vec<Candidate>,
        total: usize,
    ) -> DiscoveryPage {
        sort_candidates(&mut candidates, request.sort);
        paginate(candidates, request.page, total)
    }

    /// Filter, annotate, sort and paginate a complete candidate pool
    pub fn rank(&self, request: &DiscoveryRequest<'_>, pool: Vec<Profile>) -> DiscoveryPage {
        let candidates = self.select(request, pool);
        let total = candidates.len();
        self.order(request, candidates, total)
    }
}

fn years_before(today: NaiveDate, years: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(years.checked_mul(12)?))
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountStatus, Interaction, InteractionAction};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn profile(gender: &str, seeking: &str, age: i32, lat: f64, lon: f64) -> Profile {
        Profile {
            user_id: Uuid::new_v4(),
            status: AccountStatus::Active,
            first_name: "Test".to_string(),
            gender: gender.to_string(),
            preference: vec![seeking.to_string()],
            date_of_birth: NaiveDate::from_ymd_opt(2025 - age, 1, 1),
            latitude: Some(lat),
            longitude: Some(lon),
            city: None,
            state: None,
            height_inches: Some(68),
            body_type: Some("athletic".to_string()),
            ethnicity: vec!["white".to_string()],
            religion: None,
            education: None,
            smoking: None,
            drinking: None,
            marijuana: None,
            have_children: None,
            want_children: None,
            zodiac: None,
            interests: vec![],
            bio: None,
            profile_image: None,
            photos: vec![],
            is_verified: false,
            profile_hidden: false,
            can_start_matching: true,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            last_active_at: None,
        }
    }

    fn run(
        engine: &DiscoveryEngine,
        requester: &Profile,
        filter: &DiscoveryFilter,
        interactions: &[Interaction],
        pool: Vec<Profile>,
        sort: SortKey,
        liked_me_only: bool,
    ) -> DiscoveryPage {
        let ledger = InteractionLedger::from_records(interactions);
        let exclusions = ExclusionSet::build(requester.user_id, &[], &ledger);
        let request = DiscoveryRequest {
            requester,
            filter,
            exclusions: &exclusions,
            ledger: &ledger,
            sort,
            page: PageRequest { offset: 0, limit: 50 },
            liked_me_only,
            today: today(),
        };
        engine.rank(&request, pool)
    }

    #[test]
    fn test_rank_basic() {
        let engine = DiscoveryEngine::default();
        let requester = profile("female", "male", 30, 40.7128, -74.0060);

        let good = profile("male", "female", 30, 40.72, -74.01);
        let wrong_way = profile("male", "male", 30, 40.72, -74.01);
        let mut hidden = profile("male", "female", 30, 40.72, -74.01);
        hidden.profile_hidden = true;
        let good_id = good.user_id;

        let page = run(
            &engine,
            &requester,
            &DiscoveryFilter::default(),
            &[],
            vec![good, wrong_way, hidden],
            SortKey::Recent,
            false,
        );

        assert_eq!(page.info.total, 1);
        assert_eq!(page.candidates[0].user_id(), good_id);
        assert_eq!(page.candidates[0].age, Some(30));
        assert!(page.candidates[0].distance_km.unwrap() < 2.0);
    }

    #[test]
    fn test_liked_me_only_and_sort() {
        let engine = DiscoveryEngine::default();
        let requester = profile("female", "male", 30, 40.7128, -74.0060);
        let admirer = profile("male", "female", 28, 40.72, -74.01);
        let mut recent = profile("male", "female", 28, 40.72, -74.01);
        recent.last_active_at = Some(Utc::now());

        let likes = vec![Interaction {
            user_id: admirer.user_id,
            target_user_id: requester.user_id,
            action: InteractionAction::SuperLike,
            created_at: Utc::now() - Duration::hours(1),
            is_unmatched: false,
        }];
        let admirer_id = admirer.user_id;
        let pool = vec![recent.clone(), admirer.clone()];

        let liked_first = run(&engine, &requester, &DiscoveryFilter::default(), &likes, pool.clone(), SortKey::LikedMe, false);
        assert_eq!(liked_first.candidates[0].user_id(), admirer_id);
        assert!(liked_first.candidates[0].has_liked_me);
        assert!(!liked_first.candidates[1].has_liked_me);

        let by_recency = run(&engine, &requester, &DiscoveryFilter::default(), &likes, pool.clone(), SortKey::Recent, false);
        assert_eq!(by_recency.candidates[0].user_id(), recent.user_id);

        let only = run(&engine, &requester, &DiscoveryFilter::default(), &likes, pool, SortKey::Recent, true);
        assert_eq!(only.info.total, 1);
        assert_eq!(only.candidates[0].user_id(), admirer_id);
    }

    fn request<'a>(
        requester: &'a Profile,
        filter: &'a DiscoveryFilter,
        exclusions: &'a ExclusionSet,
        ledger: &'a InteractionLedger,
    ) -> DiscoveryRequest<'a> {
        DiscoveryRequest {
            requester,
            filter,
            exclusions,
            ledger,
            sort: SortKey::Recent,
            page: PageRequest { offset: 0, limit: 50 },
            liked_me_only: false,
            today: today(),
        }
    }

    #[test]
    fn test_candidate_query_bounding_box_only_with_distance() {
        let engine = DiscoveryEngine::default();
        let requester = profile("female", "male", 30, 40.7128, -74.0060);
        let ledger = InteractionLedger::default();
        let exclusions = ExclusionSet::build(requester.user_id, &[], &ledger);

        let unfiltered = DiscoveryFilter::default();
        let unbounded = engine.candidate_query(&request(&requester, &unfiltered, &exclusions, &ledger));
        assert!(unbounded.bounding_box.is_none());
        assert_eq!(unbounded.exclude_user_ids, vec![requester.user_id]);
        assert!(unbounded.born_on_or_before.is_none() && unbounded.born_after.is_none());

        let filter = DiscoveryFilter { max_distance_km: Some(25.0), ..Default::default() };
        let bounded = engine.candidate_query(&request(&requester, &filter, &exclusions, &ledger));
        assert!(bounded.bounding_box.is_some());
        assert_eq!(bounded.filter.max_distance_km, Some(25.0));
    }

    #[test]
    fn test_candidate_query_uses_canonical_genders() {
        let engine = DiscoveryEngine::default();
        let mut requester = profile(" Non-Binary ", "male", 30, 40.7128, -74.0060);
        requester.preference = vec!["Non Binary".to_string(), "WOMAN".to_string()];
        let ledger = InteractionLedger::default();
        let exclusions = ExclusionSet::build(requester.user_id, &[], &ledger);
        let filter = DiscoveryFilter::default();

        let query = engine.candidate_query(&request(&requester, &filter, &exclusions, &ledger));

        assert_eq!(query.requester_gender, "non_binary");
        assert_eq!(query.preferred_genders, vec!["non_binary".to_string(), "woman".to_string()]);
    }

    #[test]
    fn test_candidate_query_age_bounds_agree_with_age_on() {
        let engine = DiscoveryEngine::default();
        let requester = profile("female", "male", 30, 40.7128, -74.0060);
        let ledger = InteractionLedger::default();
        let exclusions = ExclusionSet::build(requester.user_id, &[], &ledger);
        let filter = DiscoveryFilter { min_age: Some(25), max_age: Some(35), ..Default::default() };

        let query = engine.candidate_query(&request(&requester, &filter, &exclusions, &ledger));
        let oldest_excluded = query.born_after.unwrap();
        let youngest_included = query.born_on_or_before.unwrap();

        let mut candidate = profile("male", "female", 0, 0.0, 0.0);
        for (dob, expected) in [
            (youngest_included, true),
            (youngest_included.succ_opt().unwrap(), false),
            (oldest_excluded, false),
            (oldest_excluded.succ_opt().unwrap(), true),
        ] {
            candidate.date_of_birth = Some(dob);
            let in_sql = dob <= youngest_included && dob > oldest_excluded;
            assert_eq!(in_sql, expected);
            assert_eq!(filter.matches(&candidate, candidate.age_on(today())), expected, "dob {}", dob);
        }
    }

    #[test]
    fn test_candidate_query_carries_admirers_and_sort() {
        let engine = DiscoveryEngine::default();
        let requester = profile("female", "male", 30, 40.7128, -74.0060);
        let fan = Uuid::new_v4();
        let ledger = InteractionLedger::from_records(&[Interaction {
            user_id: fan,
            target_user_id: requester.user_id,
            action: InteractionAction::Like,
            created_at: Utc::now(),
            is_unmatched: false,
        }]);
        let exclusions = ExclusionSet::build(requester.user_id, &[], &ledger);
        let filter = DiscoveryFilter::default();
        let mut req = request(&requester, &filter, &exclusions, &ledger);
        req.sort = SortKey::LikedMe;
        req.liked_me_only = true;

        let query = engine.candidate_query(&req);

        assert_eq!(query.admirer_ids, vec![fan]);
        assert_eq!(query.sort, SortKey::LikedMe);
        assert!(query.liked_me_only);
    }

    #[test]
    fn test_batches_ordered_with_store_total() {
        let engine = DiscoveryEngine::default();
        let requester = profile("female", "male", 30, 40.7128, -74.0060);
        let ledger = InteractionLedger::default();
        let exclusions = ExclusionSet::build(requester.user_id, &[], &ledger);
        let filter = DiscoveryFilter::default();
        let mut req = request(&requester, &filter, &exclusions, &ledger);
        req.page = PageRequest { offset: 0, limit: 2 };

        let pool: Vec<Profile> = (0..3).map(|_| profile("male", "female", 30, 40.72, -74.01)).collect();
        let mut eligible = engine.select(&req, pool[..2].to_vec());
        eligible.extend(engine.select(&req, pool[2..].to_vec()));

        let page = engine.order(&req, eligible, 40);
        assert_eq!(page.candidates.len(), 2);
        assert_eq!(page.info.total, 40);
        assert_eq!(page.info.next_offset, Some(2));
    }

    #[test]
    fn test_sort_key_falls_back_to_config() {
        let engine = DiscoveryEngine::new(DiscoveryConfig {
            default_sort: SortKey::Distance,
            ..Default::default()
        });
        let params = PageParams { sort: Some("bogus".to_string()), ..Default::default() };
        assert_eq!(engine.sort_key(&params), SortKey::Distance);
    }
}
