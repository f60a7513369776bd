//! Assertion: promoting a local draft to a live remote poll.
//!
//! State machine per draft: DRAFT -> ASSERTING -> LIVE, or back to DRAFT on
//! any failure. The hard rules:
//!
//! - nothing local is destroyed until a remote counterpart is confirmed;
//! - repeated asserts never create duplicates (the remote index is checked
//!   for our correlation tag first);
//! - a created poll with a failed vote carry is a surfaced partial success,
//!   never rolled back and never hidden.

use std::sync::Arc;

use crate::error::{AgoraError, AgoraResult};
use crate::exchange::{ExchangeApi, NewPoll, RemotePoll};
use crate::identity::IdentityStore;
use crate::polls::{LocalPollStore, Poll};
use crate::signing::now_ms;
use crate::stamps::StampPool;
use crate::store::{keys, KvStore};
use crate::vote::VoteClient;

/// How the locally recorded vote fared during assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteCarry {
    /// The draft had no recorded vote; nothing to carry.
    NotNeeded,
    /// The local vote was re-cast against the remote poll.
    Carried,
    /// The poll went live but the vote did not make it. Partial success,
    /// surfaced to the caller.
    Failed(String),
}

/// Result of a successful assertion: the live remote poll and the carry
/// status of the local vote.
#[derive(Debug, Clone)]
pub struct AssertOutcome {
    pub poll: RemotePoll,
    pub vote_carry: VoteCarry,
}

#[derive(Clone)]
pub struct AssertionSync {
    api: Arc<dyn ExchangeApi>,
    store: KvStore,
    identities: IdentityStore,
    polls: LocalPollStore,
    stamps: StampPool,
    votes: VoteClient,
}

impl AssertionSync {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        store: KvStore,
        identities: IdentityStore,
        polls: LocalPollStore,
        stamps: StampPool,
        votes: VoteClient,
    ) -> Self {
        Self {
            api,
            store,
            identities,
            polls,
            stamps,
            votes,
        }
    }

    /// Assert a draft to the Exchange.
    ///
    /// Fails with [`AgoraError::IdentityMissing`] before any network call
    /// when no identity exists. Any failure before the purge leaves the
    /// draft intact and the operation retryable.
    pub async fn assert_draft(&self, local_id: &str) -> AgoraResult<AssertOutcome> {
        if !self.identities.has_identity() {
            return Err(AgoraError::IdentityMissing);
        }
        let draft = self
            .polls
            .get(local_id)?
            .ok_or_else(|| AgoraError::Store(format!("no draft with id {local_id}")))?;

        // Credential reserve, best effort: an empty pool now only risks a
        // vote-carry failure later, it never blocks the assertion.
        if self.stamps.is_empty()? {
            if let Err(err) = self.stamps.mint(self.api.as_ref()).await {
                tracing::warn!(%err, "reserve mint failed, continuing assert");
            }
        }

        // Idempotent merge: a previous partially-failed assert may already
        // have created our poll. Match on the correlation tag; the most
        // recently created match wins.
        let target = match self.find_remote_counterpart(local_id).await? {
            Some(existing) => {
                tracing::info!(poll = %existing.id, "draft already live, merging");
                existing
            }
            None => {
                let new_poll = NewPoll {
                    title: draft.title.clone(),
                    description: draft.description.clone(),
                    poll_type: draft.poll_type.clone(),
                    options: draft.options.clone(),
                    created_local_id: draft.local_id.clone(),
                    asserted_at: now_ms(),
                };
                self.api.create_poll(&new_poll).await?
            }
        };

        // Carry the device's local vote forward, if one was recorded.
        let vote_carry = match self.local_choice(local_id)? {
            None => VoteCarry::NotNeeded,
            Some(choice) => match self.votes.cast(&Poll::Remote(target.clone()), &choice).await {
                Ok(_) => VoteCarry::Carried,
                Err(err) => {
                    tracing::warn!(%err, poll = %target.id, "vote carry failed");
                    VoteCarry::Failed(err.to_string())
                }
            },
        };

        // The remote poll is confirmed live: it is now the sole source of
        // truth for this content. Purge everything local.
        self.purge_draft(local_id)?;
        tracing::info!(draft = local_id, poll = %target.id, "draft asserted");

        Ok(AssertOutcome {
            poll: target,
            vote_carry,
        })
    }

    /// Look for a remote poll carrying our correlation tag.
    async fn find_remote_counterpart(&self, local_id: &str) -> AgoraResult<Option<RemotePoll>> {
        let polls = self.api.list_polls().await?;
        Ok(polls
            .into_iter()
            .filter(|p| p.meta.created_local_id.as_deref() == Some(local_id))
            .max_by_key(|p| p.created_at.unwrap_or(i64::MIN)))
    }

    /// The label this device voted for on the draft, if any.
    fn local_choice(&self, local_id: &str) -> AgoraResult<Option<String>> {
        let Some(token) = self.store.get::<String>(&keys::local_token(local_id))? else {
            return Ok(None);
        };
        let state = self.polls.vote_state(local_id)?;
        Ok(state.by_token.get(&token).cloned())
    }

    /// Drop the draft, its tally, and its per-poll local keys.
    fn purge_draft(&self, local_id: &str) -> AgoraResult<()> {
        self.polls.remove(local_id)?;
        self.store.remove(&keys::local_token(local_id))?;
        self.store.remove(&keys::last_choice(local_id))?;
        self.store.remove(&keys::voter_token(local_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::MockExchange;
    use crate::exchange::VoteCredential;
    use crate::identity::Identity;
    use crate::polls::DraftPoll;

    struct Rig {
        mock: MockExchange,
        store: KvStore,
        polls: LocalPollStore,
        sync: AssertionSync,
    }

    fn rig(with_identity: bool) -> Rig {
        let mock = MockExchange::new();
        let store = KvStore::in_memory();
        let identities = IdentityStore::new(store.clone());
        if with_identity {
            identities
                .save(
                    &Identity {
                        self_id: "self-1".into(),
                        signing_key: "k".into(),
                        alias: None,
                    },
                    false,
                )
                .unwrap();
        }
        let polls = LocalPollStore::new(store.clone());
        let stamps = StampPool::new(store.clone(), identities.clone());
        let api: Arc<dyn ExchangeApi> = Arc::new(mock.clone());
        let votes = VoteClient::new(api.clone(), store.clone(), polls.clone(), stamps.clone());
        let sync = AssertionSync::new(api, store.clone(), identities, polls.clone(), stamps, votes);
        Rig {
            mock,
            store,
            polls,
            sync,
        }
    }

    fn lunch_draft() -> DraftPoll {
        DraftPoll::new(
            "Lunch?".into(),
            None,
            vec!["Pizza".into(), "Tacos".into()],
            "single".into(),
            1_700_000_000_000,
        )
    }

    #[tokio::test]
    async fn no_identity_no_network_draft_survives() {
        let rig = rig(false);
        let draft = lunch_draft();
        rig.polls.add(&draft).unwrap();

        let err = rig.sync.assert_draft(&draft.local_id).await.unwrap_err();
        assert!(matches!(err, AgoraError::IdentityMissing));
        assert!(rig.polls.get(&draft.local_id).unwrap().is_some());
        assert_eq!(rig.mock.create_calls(), 0);
        assert_eq!(rig.mock.list_calls(), 0);
    }

    #[tokio::test]
    async fn plain_assert_creates_and_purges() {
        let rig = rig(true);
        rig.mock.set_mint_batch(vec!["s1".into()]);
        let draft = lunch_draft();
        rig.polls.add(&draft).unwrap();

        let outcome = rig.sync.assert_draft(&draft.local_id).await.unwrap();
        assert_eq!(outcome.vote_carry, VoteCarry::NotNeeded);
        assert_eq!(
            outcome.poll.meta.created_local_id.as_deref(),
            Some(draft.local_id.as_str())
        );
        assert!(rig.polls.get(&draft.local_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn local_vote_is_carried_with_a_stamp() {
        let rig = rig(true);
        rig.mock.set_mint_batch(vec!["s1".into()]);
        let draft = lunch_draft();
        rig.polls.add(&draft).unwrap();

        let token = rig.polls.ensure_local_token(&draft.local_id).unwrap();
        rig.polls
            .record_vote(&draft.local_id, &token, "Tacos", &draft.options)
            .unwrap();

        let outcome = rig.sync.assert_draft(&draft.local_id).await.unwrap();
        assert_eq!(outcome.vote_carry, VoteCarry::Carried);

        let votes = rig.mock.votes();
        assert_eq!(votes.len(), 1);
        // "Tacos" is the second option, so the mock assigned opt-1.
        assert_eq!(votes[0].option_id, "opt-1");
        assert!(matches!(votes[0].credential, VoteCredential::Stamp(_)));

        // Local state fully purged.
        assert!(rig.polls.get(&draft.local_id).unwrap().is_none());
        assert!(!rig.store.contains(&keys::local_token(&draft.local_id)));
    }

    #[tokio::test]
    async fn repeated_assert_is_idempotent() {
        let rig = rig(true);
        rig.mock.set_mint_batch(vec!["s1".into()]);
        let draft = lunch_draft();
        rig.polls.add(&draft).unwrap();

        let first = rig.sync.assert_draft(&draft.local_id).await.unwrap();

        // Simulate a retry after a partial failure: the draft is back in
        // the local store but the remote poll already exists.
        rig.polls.add(&draft).unwrap();
        let second = rig.sync.assert_draft(&draft.local_id).await.unwrap();

        assert_eq!(first.poll.id, second.poll.id);
        assert_eq!(rig.mock.create_calls(), 1, "no duplicate creation");
        assert_eq!(rig.mock.remote_polls().len(), 1);
    }

    #[tokio::test]
    async fn failed_carry_is_partial_success_not_rollback() {
        let rig = rig(true);
        // No mintable stamps at all: the carry must fail.
        rig.mock.fail_mint(true);
        let draft = lunch_draft();
        rig.polls.add(&draft).unwrap();
        let token = rig.polls.ensure_local_token(&draft.local_id).unwrap();
        rig.polls
            .record_vote(&draft.local_id, &token, "Pizza", &draft.options)
            .unwrap();

        let outcome = rig.sync.assert_draft(&draft.local_id).await.unwrap();
        assert!(matches!(outcome.vote_carry, VoteCarry::Failed(_)));
        // The poll is live and the local draft is still purged.
        assert_eq!(rig.mock.remote_polls().len(), 1);
        assert!(rig.polls.get(&draft.local_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_draft_fails_before_anything_remote() {
        let rig = rig(true);
        let draft = lunch_draft();
        // Unknown id: fails before anything remote happens.
        let err = rig.sync.assert_draft("missing").await.unwrap_err();
        assert!(matches!(err, AgoraError::Store(_)));

        rig.polls.add(&draft).unwrap();
        assert!(rig.polls.get(&draft.local_id).unwrap().is_some());
    }
}
