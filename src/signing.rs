//! Canonical request signing.
//!
//! Every privileged request carries an HMAC over a canonical base built
//! from the request itself, plus a fresh nonce and a millisecond timestamp.
//! The server rebuilds the identical base from what it receives and
//! verifies the HMAC under the signing key it issued at identity creation.
//!
//! Contract: the path signed here must be byte-identical to the path the
//! server sees, including the fixed API prefix. Callers pass the fully
//! prefixed path; a mismatch anywhere invalidates the signature.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::{self, NONCE_BYTES};
use crate::error::{AgoraError, AgoraResult};
use crate::identity::IdentityStore;

/// Signed-request header names.
pub const HEADER_SELF_ID: &str = "X-Self-ID";
pub const HEADER_TIMESTAMP: &str = "X-Timestamp";
pub const HEADER_NONCE: &str = "X-Nonce";
pub const HEADER_SIGNATURE: &str = "X-Signature";

/// Credential header names for votes.
pub const HEADER_STAMP: &str = "X-Stamp";
pub const HEADER_VOTER_TOKEN: &str = "X-Voter-Token";

/// The four authentication fields attached to a signed request.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub self_id: String,
    pub timestamp_ms: i64,
    pub nonce: String,
    pub signature: String,
}

/// Builds signed requests from the stored identity.
#[derive(Clone)]
pub struct RequestSigner {
    identities: IdentityStore,
}

impl RequestSigner {
    pub fn new(identities: IdentityStore) -> Self {
        Self { identities }
    }

    /// Sign `method path body` with a fresh nonce and the current time.
    ///
    /// Fails with [`AgoraError::IdentityMissing`] when no identity is
    /// stored. `path` must already include the API prefix.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> AgoraResult<SignedRequest> {
        let timestamp_ms = now_ms();
        let nonce = crypto::random_nonce_hex(NONCE_BYTES);
        self.sign_with(method, path, body, timestamp_ms, nonce)
    }

    /// Deterministic variant: caller supplies timestamp and nonce.
    pub fn sign_with(
        &self,
        method: &str,
        path: &str,
        body: Option<&serde_json::Value>,
        timestamp_ms: i64,
        nonce: String,
    ) -> AgoraResult<SignedRequest> {
        let identity = self
            .identities
            .get()?
            .ok_or(AgoraError::IdentityMissing)?;

        let base = canonical_base(method, path, timestamp_ms, &nonce, body);
        let signature = crypto::hmac_sha256_hex(identity.key_bytes(), base.as_bytes());

        Ok(SignedRequest {
            self_id: identity.self_id.clone(),
            timestamp_ms,
            nonce,
            signature,
        })
    }
}

/// The canonical signing base: five newline-joined fields.
///
/// `UPPERCASE_METHOD \n path \n timestamp_ms \n nonce \n sha256(body)`,
/// where the body hash covers the JSON serialization, or the empty string
/// when there is no body.
pub fn canonical_base(
    method: &str,
    path: &str,
    timestamp_ms: i64,
    nonce: &str,
    body: Option<&serde_json::Value>,
) -> String {
    let body_hash = match body {
        Some(value) => crypto::sha256_hex(value.to_string().as_bytes()),
        None => crypto::sha256_hex(b""),
    };
    format!(
        "{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        path,
        timestamp_ms,
        nonce,
        body_hash
    )
}

/// Current time as the decimal millisecond timestamp the wire format uses.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
