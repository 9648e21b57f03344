use std::sync::Arc;

use auth::random_token;
use auth::Argon2Hasher;
use auth::Authenticator;
use auth::DEFAULT_TOKEN_BYTES;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::errors::AuthError;
use crate::domain::errors::RejectionReason;
use crate::domain::revocation::service::RevocationRegistry;
use crate::domain::session::models::RefreshCredential;
use crate::domain::session::models::RefreshTokenRecord;
use crate::domain::session::models::SessionPolicy;
use crate::domain::session::models::TokenPair;
use crate::domain::session::ports::RefreshTokenRepository;
use crate::domain::user::models::UserId;

/// Issues, rotates and revokes refresh sessions.
///
/// Holds no cross-request state: the repository's conditional revoke decides
/// which of several concurrent rotations of the same credential wins.
pub struct TokenRotationService {
    repository: Arc<dyn RefreshTokenRepository>,
    registry: Arc<RevocationRegistry>,
    authenticator: Arc<Authenticator>,
    hasher: Argon2Hasher,
    policy: SessionPolicy,
}

impl TokenRotationService {
    /// Create a new rotation service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - Durable refresh token store
    /// * `registry` - Cache-backed revocation registry
    /// * `authenticator` - Access-token signer
    /// * `policy` - Session cap and lifetimes
    pub fn new(
        repository: Arc<dyn RefreshTokenRepository>,
        registry: Arc<RevocationRegistry>,
        authenticator: Arc<Authenticator>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            repository,
            registry,
            authenticator,
            hasher: Argon2Hasher::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Mint a fresh access token and refresh credential for `user_id`.
    ///
    /// The pair is signed and hashed before anything is written. The user's
    /// oldest active sessions are then evicted so that, once the new record is
    /// written, at most `max_sessions_per_user` are active.
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Signing, hashing or a store write failed
    pub async fn issue(&self, user_id: &UserId) -> Result<TokenPair, AuthError> {
        let now = Utc::now();

        let access_token = self
            .authenticator
            .issue_access_token(user_id, now)
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Access token signing failed");
                AuthError::unavailable(e)
            })?;

        let selector = random_token(DEFAULT_TOKEN_BYTES);
        let validator = random_token(DEFAULT_TOKEN_BYTES);
        let validator_hash = self
            .hasher
            .hash_secret(&validator)
            .map_err(AuthError::unavailable)?;

        let record = RefreshTokenRecord::new(
            *user_id,
            selector.clone(),
            validator_hash,
            now,
            self.policy.refresh_token_ttl,
        );
        let record_id = record.id;
        let refresh_expires_at = record.expires_at;

        self.enforce_session_cap(user_id, now).await?;

        self.repository.create(record).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to persist refresh token");
            AuthError::unavailable(e)
        })?;

        tracing::info!(
            user_id = %user_id,
            record_id = %record_id,
            token_id = %access_token.claims.jti,
            "Session issued"
        );

        Ok(TokenPair {
            user_id: *user_id,
            access_token,
            refresh_token: RefreshCredential::new(selector, validator),
            refresh_expires_at,
        })
    }

    /// Exchange a refresh credential for a new pair, consuming the old one.
    ///
    /// Presenting a credential that was already revoked is treated as theft:
    /// every session of its owner is revoked before the call fails.
    ///
    /// # Errors
    /// * `AuthenticationFailed` - Credential unknown, expired, revoked, mismatched,
    ///   or consumed by a concurrent rotation
    /// * `ServiceUnavailable` - The consuming write or the new issuance failed
    pub async fn rotate(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let credential = RefreshCredential::parse(presented)
            .map_err(|_| reject(RejectionReason::MalformedCredential))?;

        let record = match self.repository.find_by_selector(credential.selector()).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(reject(RejectionReason::UnknownSelector)),
            Err(e) => {
                tracing::warn!(error = %e, "Refresh token lookup failed");
                return Err(reject(RejectionReason::StoreFailure));
            }
        };

        let now = Utc::now();

        if record.is_revoked() {
            tracing::warn!(
                incident = "refresh_token_reuse",
                user_id = %record.user_id,
                record_id = %record.id,
                "Revoked refresh token presented, revoking every session of the user"
            );
            if let Err(e) = self.revoke_all_for_user(&record.user_id).await {
                tracing::error!(
                    user_id = %record.user_id,
                    error = %e,
                    "Mass revocation after reuse detection failed"
                );
            }
            return Err(reject(RejectionReason::SecurityIncident));
        }

        if record.is_expired(now) {
            if let Err(e) = self.repository.revoke(&record.id, now).await {
                tracing::debug!(record_id = %record.id, error = %e, "Best-effort revoke of expired token failed");
            }
            return Err(reject(RejectionReason::RefreshTokenExpired));
        }

        match self
            .hasher
            .verify_secret(credential.validator(), &record.validator_hash)
        {
            Ok(true) => {}
            Ok(false) => return Err(reject(RejectionReason::ValidatorMismatch)),
            Err(e) => {
                tracing::error!(record_id = %record.id, error = %e, "Stored validator hash unreadable");
                return Err(reject(RejectionReason::ValidatorMismatch));
            }
        }

        let claimed = self.repository.revoke(&record.id, now).await.map_err(|e| {
            tracing::error!(record_id = %record.id, error = %e, "Failed to consume refresh token");
            AuthError::unavailable(e)
        })?;
        if !claimed {
            return Err(reject(RejectionReason::LostRotationRace));
        }

        tracing::debug!(user_id = %record.user_id, record_id = %record.id, "Refresh token consumed");
        self.issue(&record.user_id).await
    }

    /// Revoke every session of a user and reject their outstanding access tokens.
    ///
    /// # Returns
    /// Number of refresh records this call revoked
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Store or cache write failed
    pub async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64, AuthError> {
        let now = Utc::now();

        let revoked = self
            .repository
            .revoke_all_for_user(user_id, now)
            .await
            .map_err(AuthError::unavailable)?;

        let marker_ttl = self
            .policy
            .user_marker_ttl
            .to_std()
            .map_err(AuthError::unavailable)?;
        self.registry
            .revoke_user(user_id, marker_ttl)
            .await
            .map_err(AuthError::unavailable)?;

        tracing::info!(user_id = %user_id, revoked = revoked, "All sessions revoked");
        Ok(revoked)
    }

    /// Revoke the session identified by `selector`.
    ///
    /// Unknown or already revoked selectors succeed without effect.
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Store failed
    pub async fn revoke(&self, selector: &str) -> Result<(), AuthError> {
        let Some(record) = self
            .repository
            .find_by_selector(selector)
            .await
            .map_err(AuthError::unavailable)?
        else {
            tracing::debug!("Revoke requested for unknown selector");
            return Ok(());
        };

        self.revoke_record(&record).await
    }

    /// Revoke the session a presented `selector:validator` credential belongs to.
    ///
    /// Only a credential whose validator matches the stored hash revokes
    /// anything. Malformed, unknown, mismatched or already revoked credentials
    /// succeed without effect.
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Store failed
    pub async fn revoke_credential(&self, presented: &str) -> Result<(), AuthError> {
        let Ok(credential) = RefreshCredential::parse(presented) else {
            tracing::debug!("Revoke requested with malformed credential");
            return Ok(());
        };

        let Some(record) = self
            .repository
            .find_by_selector(credential.selector())
            .await
            .map_err(AuthError::unavailable)?
        else {
            tracing::debug!("Revoke requested for unknown selector");
            return Ok(());
        };

        if record.is_revoked() {
            return Ok(());
        }

        match self
            .hasher
            .verify_secret(credential.validator(), &record.validator_hash)
        {
            Ok(true) => self.revoke_record(&record).await,
            Ok(false) | Err(_) => {
                tracing::warn!(
                    user_id = %record.user_id,
                    record_id = %record.id,
                    "Revoke requested with mismatched validator, ignoring"
                );
                Ok(())
            }
        }
    }

    async fn revoke_record(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        let revoked = self
            .repository
            .revoke(&record.id, Utc::now())
            .await
            .map_err(AuthError::unavailable)?;

        tracing::info!(
            user_id = %record.user_id,
            record_id = %record.id,
            already_revoked = !revoked,
            "Session revoked"
        );
        Ok(())
    }

    /// Number of active sessions of a user.
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Store failed
    pub async fn active_session_count(&self, user_id: &UserId) -> Result<usize, AuthError> {
        self.repository
            .find_active_by_user(user_id, Utc::now())
            .await
            .map(|records| records.len())
            .map_err(AuthError::unavailable)
    }

    async fn enforce_session_cap(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let active = self
            .repository
            .find_active_by_user(user_id, now)
            .await
            .map_err(AuthError::unavailable)?;

        let max = self.policy.max_sessions_per_user.max(1);
        let excess = (active.len() + 1).saturating_sub(max);

        for record in active.iter().take(excess) {
            self.repository
                .revoke(&record.id, now)
                .await
                .map_err(AuthError::unavailable)?;
            tracing::info!(
                user_id = %user_id,
                record_id = %record.id,
                "Session evicted by per-user cap"
            );
        }

        Ok(())
    }
}

fn reject(reason: RejectionReason) -> AuthError {
    tracing::warn!(reason = %reason, "Refresh token rejected");
    reason.into()
}
