//! Discovery engine - candidate selection and ranking for a dating app
//!
//! Given an authenticated requester, this library produces an ordered, paged
//! list of other users that are eligible to be shown to them. Eligibility is
//! a multi-stage pipeline: exclusions (self, blocks, prior decisions, mutual
//! matches), bidirectional gender preference, normalized attribute filters
//! and a great-circle distance limit. Candidates are annotated with whether
//! they already liked the requester, then sorted and paginated.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    distance::{calculate_bounding_box, haversine_distance},
    DiscoveryEngine, DiscoveryFilter, DiscoveryRequest, ExclusionSet, FilterNormalizer,
    InteractionLedger, SortKey,
};
pub use config::DiscoveryConfig;
pub use error::DiscoveryError;
pub use models::{Candidate, CandidateView, Profile, RawFilters};
