// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AccountStatus, Block, BoundingBox, Candidate, CandidateQuery, Coordinates, Interaction,
    InteractionAction, Profile,
};
pub use requests::{PageParams, RawFilters};
pub use responses::{ApiResponse, CandidateView, HealthResponse, PageInfo};
