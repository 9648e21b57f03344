use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::hashing::Argon2Hasher;
use crate::hashing::HashError;
use crate::token::AccessClaims;
use crate::token::TokenError;
use crate::token::TokenSigner;

/// Authentication coordinator combining password verification and access-token signing.
pub struct Authenticator {
    hasher: Argon2Hasher,
    signer: TokenSigner,
    access_token_ttl: Duration,
}

/// A freshly signed access token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub claims: AccessClaims,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticatorError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `secret` - HS256 signing secret, at least 32 bytes
    /// * `access_token_ttl` - Lifetime of issued access tokens
    ///
    /// # Errors
    /// * `WeakSecret` - Secret is shorter than 32 bytes
    pub fn new(secret: &[u8], access_token_ttl: Duration) -> Result<Self, TokenError> {
        Ok(Self {
            hasher: Argon2Hasher::new(),
            signer: TokenSigner::new(secret)?,
            access_token_ttl,
        })
    }

    /// Lifetime of the access tokens this authenticator issues.
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Verify a login password against a stored PHC hash.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `Hash` - Stored hash could not be parsed
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<(), AuthenticatorError> {
        if self.hasher.verify_password(password, stored_hash)? {
            Ok(())
        } else {
            Err(AuthenticatorError::InvalidCredentials)
        }
    }

    /// Mint an access token for `subject` issued at `now`.
    ///
    /// # Errors
    /// * `Token` - Signing failed
    pub fn issue_access_token(
        &self,
        subject: impl ToString,
        now: DateTime<Utc>,
    ) -> Result<SignedAccessToken, AuthenticatorError> {
        let claims = AccessClaims::new(subject, now, self.access_token_ttl);
        let token = self.signer.encode(&claims)?;

        Ok(SignedAccessToken { token, claims })
    }

    /// Verify signature and expiry of an access token.
    ///
    /// # Errors
    /// * `TokenError` - Token is expired, forged or malformed
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.signer.decode(token)
    }
}
