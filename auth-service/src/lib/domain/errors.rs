use std::fmt;

use thiserror::Error;

/// Failure reported by a store adapter (relational store or cache tier).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call exceeded its deadline")]
    Timeout,

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Externally visible outcome of a failed auth operation.
///
/// `AuthenticationFailed` is deliberately undifferentiated: the concrete
/// [`RejectionReason`] is only ever logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("{0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Wrap an infrastructure failure on a write path.
    pub fn unavailable(err: impl fmt::Display) -> Self {
        AuthError::ServiceUnavailable(err.to_string())
    }
}

/// Internal classification of a rejected credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MissingCredential,
    MalformedCredential,
    UnknownSelector,
    RefreshTokenExpired,
    ValidatorMismatch,
    LostRotationRace,
    /// A revoked refresh token was presented again
    SecurityIncident,
    InvalidSignature,
    AccessTokenExpired,
    TokenRevoked,
    UserRevoked,
    StoreFailure,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::MissingCredential => "missing_credential",
            RejectionReason::MalformedCredential => "malformed_credential",
            RejectionReason::UnknownSelector => "unknown_selector",
            RejectionReason::RefreshTokenExpired => "refresh_token_expired",
            RejectionReason::ValidatorMismatch => "validator_mismatch",
            RejectionReason::LostRotationRace => "lost_rotation_race",
            RejectionReason::SecurityIncident => "security_incident",
            RejectionReason::InvalidSignature => "invalid_signature",
            RejectionReason::AccessTokenExpired => "access_token_expired",
            RejectionReason::TokenRevoked => "token_revoked",
            RejectionReason::UserRevoked => "user_revoked",
            RejectionReason::StoreFailure => "store_failure",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RejectionReason> for AuthError {
    fn from(_: RejectionReason) -> Self {
        AuthError::AuthenticationFailed
    }
}
