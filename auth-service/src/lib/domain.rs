pub mod cache;
pub mod errors;
pub mod gateway;
pub mod rate_limit;
pub mod revocation;
pub mod session;
pub mod user;
