use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::models::UserId;

/// Caller identity bound to a request after its access token was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    /// `jti` of the presented access token
    pub token_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
