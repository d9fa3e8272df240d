// Service exports
pub mod auth;
pub mod cache;
pub mod discovery;
pub mod postgres;
pub mod storage;

pub use auth::{AuthError, AuthenticatedUser, Claims, TokenVerifier};
pub use cache::{CacheError, CacheKey, CacheManager};
pub use discovery::{DiscoveryFeed, DiscoveryService};
pub use postgres::{PostgresClient, PostgresError};
pub use storage::{StorageClient, StorageError};
