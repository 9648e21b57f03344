//! Authentication primitives library
//!
//! Provides the crypto and token building blocks of the auth service:
//! - Argon2id hashing for passwords (PHC format) and refresh-token validators (`salt$hash`)
//! - Constant-time validator comparison
//! - Random URL-safe token generation
//! - HS256 access-token signing and verification
//!
//! # Examples
//!
//! ## Validator hashing
//! ```
//! use auth::Argon2Hasher;
//!
//! let hasher = Argon2Hasher::new();
//! let stored = hasher.hash_secret("validator").unwrap();
//! assert!(hasher.verify_secret("validator", &stored).unwrap());
//! ```
//!
//! ## Access tokens
//! ```
//! use auth::Authenticator;
//! use chrono::{Duration, Utc};
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!", Duration::minutes(15)).unwrap();
//! let issued = auth.issue_access_token("user123", Utc::now()).unwrap();
//! let claims = auth.validate_access_token(&issued.token).unwrap();
//! assert_eq!(claims.sub, "user123");
//! ```

pub mod authenticator;
pub mod hashing;
pub mod token;

pub use authenticator::Authenticator;
pub use authenticator::AuthenticatorError;
pub use authenticator::SignedAccessToken;
pub use hashing::random_token;
pub use hashing::Argon2Hasher;
pub use hashing::HashError;
pub use hashing::DEFAULT_TOKEN_BYTES;
pub use token::AccessClaims;
pub use token::TokenError;
pub use token::TokenSigner;
