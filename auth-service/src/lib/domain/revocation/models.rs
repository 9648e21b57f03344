use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Cache value stored for a blacklisted access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub user_id: String,
    pub revoked_at: DateTime<Utc>,
}

/// Cache key of a blacklisted access token.
pub fn token_key(token_id: &str) -> String {
    format!("revoked:token:{}", token_id)
}

/// Cache key of a user-wide revocation marker.
pub fn user_key(user_id: &str) -> String {
    format!("revoked:user:{}", user_id)
}
