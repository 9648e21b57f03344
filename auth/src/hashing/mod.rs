pub mod argon2;
pub mod errors;
pub mod random;

pub use self::argon2::Argon2Hasher;
pub use errors::HashError;
pub use random::random_token;
pub use random::DEFAULT_TOKEN_BYTES;
