// Core pipeline exports
pub mod annotator;
pub mod distance;
pub mod eligibility;
pub mod engine;
pub mod exclusion;
pub mod filters;
pub mod interactions;
pub mod ranking;

pub use distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box, DistanceUnit};
pub use engine::{DiscoveryEngine, DiscoveryRequest};
pub use exclusion::ExclusionSet;
pub use filters::{DiscoveryFilter, FilterNormalizer, UnknownTokenPolicy};
pub use interactions::{is_mutual, InteractionLedger};
pub use ranking::{DiscoveryPage, PageRequest, SortKey};
