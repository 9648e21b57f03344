use std::sync::Arc;

use auth::Authenticator;
use auth::TokenError;

use crate::domain::errors::AuthError;
use crate::domain::errors::RejectionReason;
use crate::domain::gateway::models::Identity;
use crate::domain::revocation::service::RevocationRegistry;
use crate::domain::user::models::UserId;

const BEARER_PREFIX: &str = "Bearer ";

/// Per-request access token verification.
///
/// Signature and expiry are checked first, then the token blacklist, then the
/// user-wide marker. Any failure surfaces as `AuthenticationFailed`.
pub struct AuthGateway {
    authenticator: Arc<Authenticator>,
    registry: Arc<RevocationRegistry>,
}

impl AuthGateway {
    pub fn new(authenticator: Arc<Authenticator>, registry: Arc<RevocationRegistry>) -> Self {
        Self {
            authenticator,
            registry,
        }
    }

    /// Extract the token from an `Authorization` header value.
    pub fn parse_bearer(header: &str) -> Option<&str> {
        header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Verify the raw `Authorization` header of a request.
    ///
    /// # Errors
    /// * `AuthenticationFailed` - Header missing or token rejected
    pub async fn verify(&self, authorization: Option<&str>) -> Result<Identity, AuthError> {
        let Some(header) = authorization else {
            return Err(reject(RejectionReason::MissingCredential));
        };
        let Some(token) = Self::parse_bearer(header) else {
            return Err(reject(RejectionReason::MalformedCredential));
        };

        self.verify_token(token).await
    }

    /// Verify a bare access token.
    ///
    /// # Errors
    /// * `AuthenticationFailed` - Token forged, expired, malformed or revoked,
    ///   or the revocation state could not be read
    pub async fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let identity = self.decode(token)?;

        match self.registry.is_token_revoked(&identity.token_id).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(user_id = %identity.user_id, token_id = %identity.token_id, "Blacklisted token presented");
                return Err(reject(RejectionReason::TokenRevoked));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token blacklist lookup failed");
                return Err(reject(RejectionReason::StoreFailure));
            }
        }

        match self.registry.user_revoked_before(&identity.user_id).await {
            Ok(Some(marker)) if identity.issued_at <= marker => {
                tracing::debug!(
                    user_id = %identity.user_id,
                    token_id = %identity.token_id,
                    revoked_before = %marker,
                    "Token issued before user-wide revocation"
                );
                return Err(reject(RejectionReason::UserRevoked));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "User revocation lookup failed");
                return Err(reject(RejectionReason::StoreFailure));
            }
        }

        Ok(identity)
    }

    /// Decode a token for logout without consulting the revocation state.
    ///
    /// # Errors
    /// * `AuthenticationFailed` - Signature, expiry or claims invalid
    pub fn decode(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self
            .authenticator
            .validate_access_token(token)
            .map_err(|e| match e {
                TokenError::Expired => reject(RejectionReason::AccessTokenExpired),
                TokenError::InvalidSignature => reject(RejectionReason::InvalidSignature),
                _ => reject(RejectionReason::MalformedCredential),
            })?;

        let user_id = UserId::from_string(&claims.sub)
            .map_err(|_| reject(RejectionReason::MalformedCredential))?;

        Ok(Identity {
            user_id,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
            token_id: claims.jti,
        })
    }

    /// Blacklist the token behind `identity` until it would have expired.
    ///
    /// # Errors
    /// * `ServiceUnavailable` - Cache write failed
    pub async fn revoke(&self, identity: &Identity) -> Result<(), AuthError> {
        self.registry
            .revoke_token(&identity.token_id, &identity.user_id, identity.expires_at)
            .await
            .map_err(AuthError::unavailable)
    }
}

fn reject(reason: RejectionReason) -> AuthError {
    tracing::debug!(reason = %reason, "Access token rejected");
    reason.into()
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::Duration;
    use chrono::Utc;
    use mockall::mock;

    use super::*;
    use crate::domain::cache::KeyValueCache;
    use crate::domain::errors::StoreError;
    use crate::outbound::memory::InMemoryCache;

    mock! {
        pub TestCache {}

        #[async_trait]
        impl KeyValueCache for TestCache {
            async fn set_with_ttl(&self, key: &str, value: &str, ttl: StdDuration) -> Result<(), StoreError>;
            async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
            async fn exists(&self, key: &str) -> Result<bool, StoreError>;
            async fn increment_with_ttl(&self, key: &str, ttl: StdDuration) -> Result<i64, StoreError>;
            async fn increment_many_with_ttl(&self, entries: &[(String, StdDuration)]) -> Result<Vec<i64>, StoreError>;
        }
    }

    const SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    fn authenticator() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(SECRET, Duration::minutes(15)).unwrap())
    }

    fn gateway() -> (AuthGateway, Arc<Authenticator>, Arc<RevocationRegistry>) {
        let authenticator = authenticator();
        let registry = Arc::new(RevocationRegistry::new(Arc::new(InMemoryCache::new())));
        let gateway = AuthGateway::new(Arc::clone(&authenticator), Arc::clone(&registry));
        (gateway, authenticator, registry)
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(AuthGateway::parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(AuthGateway::parse_bearer("Bearer "), None);
        assert_eq!(AuthGateway::parse_bearer("Basic abc"), None);
        assert_eq!(AuthGateway::parse_bearer("abc"), None);
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        let (gateway, authenticator, _) = gateway();
        let user_id = UserId::new();
        let issued = authenticator.issue_access_token(user_id, Utc::now()).unwrap();

        let header = format!("Bearer {}", issued.token);
        let identity = gateway.verify(Some(&header)).await.expect("token accepted");

        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.token_id, issued.claims.jti);
        assert_eq!(identity.expires_at, issued.claims.expires_at());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_headers() {
        let (gateway, _, _) = gateway();

        assert_eq!(gateway.verify(None).await.unwrap_err(), AuthError::AuthenticationFailed);
        assert_eq!(
            gateway.verify(Some("Token abc")).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
        assert_eq!(
            gateway.verify(Some("Bearer not-a-jwt")).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let (gateway, authenticator, _) = gateway();
        let issued = authenticator
            .issue_access_token(UserId::new(), Utc::now() - Duration::hours(1))
            .unwrap();

        assert_eq!(
            gateway.verify_token(&issued.token).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let (gateway, _, _) = gateway();
        let foreign = Authenticator::new(b"another-secret-that-is-also-32-bytes-long", Duration::minutes(15))
            .unwrap()
            .issue_access_token(UserId::new(), Utc::now())
            .unwrap();

        assert_eq!(
            gateway.verify_token(&foreign.token).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected_before_expiry() {
        let (gateway, authenticator, _) = gateway();
        let issued = authenticator.issue_access_token(UserId::new(), Utc::now()).unwrap();

        let identity = gateway.verify_token(&issued.token).await.unwrap();
        gateway.revoke(&identity).await.unwrap();

        assert_eq!(
            gateway.verify_token(&issued.token).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_user_marker_rejects_earlier_tokens_only() {
        let (gateway, authenticator, registry) = gateway();
        let user_id = UserId::new();
        let before = authenticator
            .issue_access_token(user_id, Utc::now() - Duration::seconds(5))
            .unwrap();

        registry
            .revoke_user(&user_id, StdDuration::from_secs(900))
            .await
            .unwrap();

        let after = authenticator
            .issue_access_token(user_id, Utc::now() + Duration::seconds(2))
            .unwrap();

        assert_eq!(
            gateway.verify_token(&before.token).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
        assert!(gateway.verify_token(&after.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_cache_failure_denies() {
        let mut cache = MockTestCache::new();
        cache
            .expect_exists()
            .returning(|_| Err(StoreError::Timeout));

        let authenticator = authenticator();
        let registry = Arc::new(RevocationRegistry::new(Arc::new(cache)));
        let gateway = AuthGateway::new(Arc::clone(&authenticator), registry);
        let issued = authenticator.issue_access_token(UserId::new(), Utc::now()).unwrap();

        assert_eq!(
            gateway.verify_token(&issued.token).await.unwrap_err(),
            AuthError::AuthenticationFailed
        );
    }
}
