use std::fmt;

use auth::SignedAccessToken;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::user::models::UserId;

/// Refresh token record unique identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshTokenId(pub Uuid);

impl RefreshTokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RefreshTokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RefreshTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Durable half of a refresh session.
///
/// Only the validator's salted hash is stored. `revoked_at` is set at most
/// once and never cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub user_id: UserId,
    pub selector: String,
    pub validator_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn new(
        user_id: UserId,
        selector: String,
        validator_hash: String,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: RefreshTokenId::new(),
            user_id,
            selector,
            validator_hash,
            created_at,
            expires_at: created_at + ttl,
            revoked_at: None,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Not revoked and not yet expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

/// Error for refresh credential parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Refresh credential must be `selector:validator`")]
    MissingSeparator,

    #[error("Refresh credential has an empty part")]
    EmptyPart,
}

/// Opaque refresh credential handed to the client: `selector:validator`.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshCredential {
    selector: String,
    validator: String,
}

impl RefreshCredential {
    const SEPARATOR: char = ':';

    pub fn new(selector: String, validator: String) -> Self {
        Self {
            selector,
            validator,
        }
    }

    /// Split a presented credential into its selector and validator.
    ///
    /// # Errors
    /// * `MissingSeparator` - No `:` in the value
    /// * `EmptyPart` - Selector or validator is empty
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let (selector, validator) = raw
            .split_once(Self::SEPARATOR)
            .ok_or(CredentialError::MissingSeparator)?;

        if selector.is_empty() || validator.is_empty() {
            return Err(CredentialError::EmptyPart);
        }

        Ok(Self::new(selector.to_string(), validator.to_string()))
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }

    /// Wire form sent in the refresh cookie.
    pub fn expose(&self) -> String {
        format!("{}{}{}", self.selector, Self::SEPARATOR, self.validator)
    }
}

// Keep the validator out of logs.
impl fmt::Debug for RefreshCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCredential")
            .field("selector", &self.selector)
            .field("validator", &"<redacted>")
            .finish()
    }
}

/// Access token plus refresh credential minted by one issuance.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub user_id: UserId,
    pub access_token: SignedAccessToken,
    pub refresh_token: RefreshCredential,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Session limits applied by the rotation service.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Upper bound on simultaneously active refresh sessions per user
    pub max_sessions_per_user: usize,
    pub refresh_token_ttl: Duration,
    /// Lifetime of a user-wide revocation marker; must cover the longest access token
    pub user_marker_ttl: Duration,
}
