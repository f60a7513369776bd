//! Cryptographic primitives: hashing, HMAC, nonce generation.
//!
//! Pure functions, no state. Everything upstream (request signing,
//! proof-of-work, stamp handling) builds on these three operations.
//!
//! HMAC-SHA256 via `ring`, plain SHA-256 via `sha2`, hex-encoded output
//! throughout because the Exchange wire format is hex strings.

pub mod pow;

use rand::RngCore;
use ring::hmac;
use sha2::{Digest, Sha256};

/// Minimum random bytes in a request nonce.
pub const NONCE_BYTES: usize = 16;

/// SHA-256 of `data`, hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 of `message` under `key`, hex-encoded.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let tag = hmac::sign(&key, message);
    hex::encode(tag.as_ref())
}

/// Verify an HMAC-SHA256 hex tag in constant time.
pub fn hmac_sha256_verify(key: &[u8], message: &[u8], tag_hex: &str) -> bool {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    match hex::decode(tag_hex) {
        Ok(tag) => hmac::verify(&key, message, &tag).is_ok(),
        Err(_) => false,
    }
}

/// Fresh random nonce of `n_bytes` bytes, hex-encoded.
///
/// Uses the OS CSPRNG. Nonces are never reused: every signed request
/// draws a new one.
pub fn random_nonce_hex(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
