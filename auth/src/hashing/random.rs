use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Default entropy for selectors and validators.
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// Fill a buffer of `len` bytes from the operating system CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate a random URL-safe base64 string (no padding) from `len` random bytes.
///
/// The output alphabet never contains `:` or `$`, so tokens can be joined with
/// either separator and split back unambiguously.
pub fn random_token(len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(len))
}
