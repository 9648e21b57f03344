use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use subtle::ConstantTimeEq;

use super::errors::HashError;
use super::random::random_bytes;

const SECRET_SALT_LEN: usize = 16;
const SECRET_DIGEST_LEN: usize = 32;
const SECRET_SEPARATOR: char = '$';

/// Argon2id hasher for user passwords and refresh-token validators.
///
/// Passwords are stored in PHC string format. Validators are stored as
/// `salt$hash`, both halves URL-safe base64, and compared in constant time.
#[derive(Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Create a hasher with the crate's default Argon2id parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash a plaintext password into a PHC string.
    ///
    /// # Errors
    /// * `HashingFailed` - Argon2 rejected the input
    pub fn hash_password(&self, password: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::HashingFailed(e.to_string()))
    }

    /// Check a plaintext password against a stored PHC string.
    ///
    /// # Errors
    /// * `MalformedHash` - Stored value is not a PHC string
    pub fn verify_password(&self, password: &str, stored: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(stored)
            .map_err(|e| HashError::MalformedHash(format!("Invalid password hash: {}", e)))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Hash a high-entropy secret with a fresh random salt.
    ///
    /// # Returns
    /// `salt$hash` encoded string; the raw secret is not recoverable from it
    ///
    /// # Errors
    /// * `HashingFailed` - Argon2 rejected the input
    pub fn hash_secret(&self, secret: &str) -> Result<String, HashError> {
        let salt = random_bytes(SECRET_SALT_LEN);
        let digest = self.digest(secret, &salt)?;

        Ok(format!(
            "{}{}{}",
            URL_SAFE_NO_PAD.encode(&salt),
            SECRET_SEPARATOR,
            URL_SAFE_NO_PAD.encode(digest)
        ))
    }

    /// Check a secret against a `salt$hash` value produced by [`hash_secret`].
    ///
    /// The digests are compared in constant time.
    ///
    /// # Errors
    /// * `MalformedHash` - Stored value is not `salt$hash` or not base64
    ///
    /// [`hash_secret`]: Argon2Hasher::hash_secret
    pub fn verify_secret(&self, secret: &str, stored: &str) -> Result<bool, HashError> {
        let (salt, expected) = stored
            .split_once(SECRET_SEPARATOR)
            .ok_or_else(|| HashError::MalformedHash("missing salt separator".to_string()))?;

        let salt = URL_SAFE_NO_PAD
            .decode(salt)
            .map_err(|e| HashError::MalformedHash(format!("salt: {}", e)))?;
        let expected = URL_SAFE_NO_PAD
            .decode(expected)
            .map_err(|e| HashError::MalformedHash(format!("digest: {}", e)))?;

        let actual = self.digest(secret, &salt)?;

        Ok(actual.as_slice().ct_eq(expected.as_slice()).into())
    }

    fn digest(&self, secret: &str, salt: &[u8]) -> Result<[u8; SECRET_DIGEST_LEN], HashError> {
        let mut out = [0u8; SECRET_DIGEST_LEN];
        self.argon2
            .hash_password_into(secret.as_bytes(), salt, &mut out)
            .map_err(|e| HashError::HashingFailed(e.to_string()))?;
        Ok(out)
    }
}
