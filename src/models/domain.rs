use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{DiscoveryFilter, SortKey};

/// Account lifecycle state of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

/// Profile row joined with its owner's account status.
///
/// Enumerated attributes are stored as lowercase tokens; the engine still
/// normalizes them before comparing so legacy mixed-case rows match.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub status: AccountStatus,
    pub first_name: String,
    pub gender: String,
    /// Genders this user accepts
    pub preference: Vec<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub height_inches: Option<i32>,
    pub body_type: Option<String>,
    pub ethnicity: Vec<String>,
    pub religion: Option<String>,
    pub education: Option<String>,
    pub smoking: Option<String>,
    pub drinking: Option<String>,
    pub marijuana: Option<String>,
    pub have_children: Option<String>,
    pub want_children: Option<String>,
    pub zodiac: Option<String>,
    pub interests: Vec<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub photos: Vec<String>,
    pub is_verified: bool,
    pub profile_hidden: bool,
    pub can_start_matching: bool,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Coordinates if both are present and inside valid WGS84 ranges
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon),
            _ => None,
        }
    }

    /// Age in whole years on `today`
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }

    /// Most recent of signup and last activity, used for recency ordering
    pub fn recency(&self) -> DateTime<Utc> {
        match self.last_active_at {
            Some(active) if active > self.created_at => active,
            _ => self.created_at,
        }
    }

    pub fn is_discoverable(&self) -> bool {
        self.status == AccountStatus::Active && !self.profile_hidden && self.can_start_matching
    }
}

/// A validated latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

/// Directional action one user took toward another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interaction_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Like,
    SuperLike,
    Pass,
}

impl InteractionAction {
    pub fn is_positive(self) -> bool {
        matches!(self, InteractionAction::Like | InteractionAction::SuperLike)
    }
}

/// Interaction (match) record as stored by the like/pass endpoints
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interaction {
    pub user_id: Uuid,
    pub target_user_id: Uuid,
    pub action: InteractionAction,
    pub created_at: DateTime<Utc>,
    pub is_unmatched: bool,
}

impl Interaction {
    pub fn is_active(&self) -> bool {
        !self.is_unmatched
    }
}

/// Directional block record; exclusion is applied in both directions
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Block {
    pub blocker_id: Uuid,
    pub blocked_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Block {
    /// The other party of this block relative to `user_id`, if involved
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if self.blocker_id == user_id {
            Some(self.blocked_id)
        } else if self.blocked_id == user_id {
            Some(self.blocker_id)
        } else {
            None
        }
    }
}

/// A profile that survived filtering for one requester, with the
/// requester-relative fields that do not belong on `Profile`
#[derive(Debug, Clone)]
pub struct Candidate {
    pub profile: Profile,
    pub age: Option<u32>,
    pub distance_km: Option<f64>,
    pub has_liked_me: bool,
}

impl Candidate {
    pub fn user_id(&self) -> Uuid {
        self.profile.user_id
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Store-side form of one discovery request.
///
/// Carries every predicate the pipeline applies so the store returns only
/// eligible rows, already in feed order. Tokens are canonical and are
/// compared against `canonical_token(column)` in SQL.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub requester_id: Uuid,
    pub requester_gender: String,
    pub preferred_genders: Vec<String>,
    pub exclude_user_ids: Vec<Uuid>,
    /// `age >= min_age` as a birth date bound
    pub born_on_or_before: Option<NaiveDate>,
    /// `age <= max_age` as a birth date bound
    pub born_after: Option<NaiveDate>,
    pub filter: DiscoveryFilter,
    /// Requester location; distance ordering and the max-distance
    /// predicate are skipped without it
    pub origin: Option<Coordinates>,
    pub earth_radius_km: f64,
    pub bounding_box: Option<BoundingBox>,
    pub sort: SortKey,
    /// Users with an active like or super like toward the requester
    pub admirer_ids: Vec<Uuid>,
    pub liked_me_only: bool,
}
