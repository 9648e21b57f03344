//! In-process adapters for single-instance deployments and tests.

pub mod cache;
pub mod refresh_token;
pub mod user;

pub use cache::InMemoryCache;
pub use refresh_token::InMemoryRefreshTokenRepository;
pub use user::InMemoryUserDirectory;
