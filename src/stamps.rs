//! Anonymous voting stamp pool.
//!
//! A stamp is an opaque single-use credential authorizing exactly one
//! first vote. The pool is device-local and persisted; minting is a signed
//! request so the Exchange can meter issuance per identity while the stamp
//! itself stays unlinkable to it at vote time.
//!
//! Consumption semantics: `take_one` REMOVES the stamp from the pool and
//! persists the shrunken pool before handing the stamp out. A consumed
//! stamp is never observable in the pool again, which is the anti-replay
//! invariant the credential system is built on. A vote that fails after
//! the pick forfeits that stamp; minting another is cheap.

use crate::error::AgoraResult;
use crate::exchange::ExchangeApi;
use crate::identity::IdentityStore;
use crate::store::{keys, KvStore};

#[derive(Clone)]
pub struct StampPool {
    store: KvStore,
    identities: IdentityStore,
}

impl StampPool {
    pub fn new(store: KvStore, identities: IdentityStore) -> Self {
        Self { store, identities }
    }

    /// Unconsumed stamps currently pooled.
    pub fn len(&self) -> AgoraResult<usize> {
        Ok(self.pool()?.len())
    }

    pub fn is_empty(&self) -> AgoraResult<bool> {
        Ok(self.pool()?.is_empty())
    }

    /// Mint stamps via a signed request and pool the issued ones,
    /// deduplicated. Returns how many new stamps were added.
    pub async fn mint(&self, api: &dyn ExchangeApi) -> AgoraResult<usize> {
        let receipt = api.mint_stamps().await?;
        let mut pool = self.pool()?;
        let before = pool.len();
        for stamp in receipt.issued {
            if !pool.contains(&stamp) {
                pool.push(stamp);
            }
        }
        let added = pool.len() - before;
        if added > 0 {
            self.store.put(keys::STAMP_POOL, &pool)?;
        }
        tracing::debug!(added, pooled = pool.len(), "stamps minted");
        Ok(added)
    }

    /// Take one stamp out of the pool. The removal is persisted before the
    /// stamp is returned, so no two picks can ever yield the same stamp.
    pub fn take_one(&self) -> AgoraResult<Option<String>> {
        let mut pool = self.pool()?;
        let Some(stamp) = pool.pop() else {
            return Ok(None);
        };
        self.store.put(keys::STAMP_POOL, &pool)?;
        Ok(Some(stamp))
    }

    /// A pooled stamp if available; otherwise mint once and retry, when an
    /// identity exists to sign the mint. A failed mint degrades to `None`
    /// rather than an error so the caller decides how to surface it.
    pub async fn get_or_mint(&self, api: &dyn ExchangeApi) -> AgoraResult<Option<String>> {
        if let Some(stamp) = self.take_one()? {
            return Ok(Some(stamp));
        }
        if !self.identities.has_identity() {
            return Ok(None);
        }
        if let Err(err) = self.mint(api).await {
            tracing::warn!(%err, "stamp mint failed");
            return Ok(None);
        }
        self.take_one()
    }

    /// Discard the whole pool. Recovery path for a stale pool the Exchange
    /// has started rejecting.
    pub fn clear(&self) -> AgoraResult<()> {
        self.store.remove(keys::STAMP_POOL)
    }

    fn pool(&self) -> AgoraResult<Vec<String>> {
        Ok(self.store.get(keys::STAMP_POOL)?.unwrap_or_default())
    }
}
