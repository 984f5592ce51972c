//! Challenge digest helpers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of the input and return it Base64-encoded.
///
/// This is the digest both sides of the login handshake use: the client
/// sends `sha256_base64(localPasswordHash + nonce)` and the server
/// recomputes it from the stored hash and the pending nonce.
pub fn sha256_base64(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// The expected login proof for a stored password hash and an issued nonce.
#[inline]
pub fn login_challenge(stored_hash: &str, nonce: &str) -> String {
    sha256_base64(&format!("{stored_hash}{nonce}"))
}
