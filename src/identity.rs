//! Self-sovereign device identity.
//!
//! An identity is created exactly once per device installation through a
//! proof-of-work exchange, then read many times. The signing key authorizes
//! every privileged request (poll creation, stamp minting) and is never
//! transmitted again after creation, never logged, and zeroized in memory
//! on drop.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::pow;
use crate::error::{AgoraError, AgoraResult};
use crate::exchange::ExchangeApi;
use crate::store::{keys, KvStore};

/// The device's identity with the Exchange.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Identity {
    /// Public identifier the Exchange knows us by.
    pub self_id: String,
    /// Symmetric signing key, hex string as issued. The HMAC key is the
    /// UTF-8 bytes of this string, matching what the server stored.
    pub signing_key: String,
    /// Server-assigned public alias, if any.
    pub alias: Option<String>,
}

impl Identity {
    /// Raw HMAC key bytes.
    pub fn key_bytes(&self) -> &[u8] {
        self.signing_key.as_bytes()
    }
}

// The signing key must never appear in logs or debug output.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("self_id", &self.self_id)
            .field("signing_key", &"<redacted>")
            .field("alias", &self.alias)
            .finish()
    }
}

/// Persistence for the device identity. No network calls.
#[derive(Clone)]
pub struct IdentityStore {
    store: KvStore,
}

impl IdentityStore {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// True if an identity record is persisted.
    pub fn has_identity(&self) -> bool {
        self.store.contains(keys::IDENTITY)
    }

    /// Load the stored identity, if any.
    pub fn get(&self) -> AgoraResult<Option<Identity>> {
        self.store.get(keys::IDENTITY)
    }

    /// Persist an identity.
    ///
    /// Refuses to overwrite an existing identity unless `replace` is set;
    /// replacing an identity orphans everything signed with the old key, so
    /// callers must decide that explicitly.
    pub fn save(&self, identity: &Identity, replace: bool) -> AgoraResult<()> {
        if self.has_identity() && !replace {
            return Err(AgoraError::Store(
                "identity already present on this device; refusing to overwrite".into(),
            ));
        }
        self.store.put(keys::IDENTITY, identity)
    }
}

/// Create an identity with the Exchange: fetch the proof-of-work challenge,
/// solve it, submit the solution, persist the issued identity.
///
/// `alias` is a purely local label; the Exchange may assign its own
/// `public_alias`, which wins when present.
pub async fn enroll(
    api: &dyn ExchangeApi,
    identities: &IdentityStore,
    alias: Option<String>,
    replace: bool,
) -> AgoraResult<Identity> {
    if identities.has_identity() && !replace {
        return Err(AgoraError::Store(
            "identity already present on this device; refusing to overwrite".into(),
        ));
    }

    let spec = api.fetch_challenge().await?;
    tracing::info!(difficulty = spec.difficulty, "solving identity challenge");
    let nonce = pow::solve(&spec.challenge, spec.difficulty).await;

    let grant = api.create_identity(&spec.challenge, &nonce).await?;
    let identity = Identity {
        self_id: grant.self_id,
        signing_key: grant.signing_key,
        alias: grant.public_alias.or(alias),
    };
    identities.save(&identity, replace)?;
    tracing::info!(self_id = %identity.self_id, "identity created");
    Ok(identity)
}
