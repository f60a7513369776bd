//! Vote casting.
//!
//! Three paths, one entry point:
//! - draft poll: recorded locally under a stable per-poll device token;
//! - remote poll, first vote: spends a stamp, banks the issued voter token;
//! - remote poll, revote: uses the banked voter token, no stamp spent.
//!
//! The only automatic retry in the whole client lives here: a stamp vote
//! rejected for credential reasons clears the (presumed stale) pool, mints
//! once, and retries exactly once before surfacing the failure.

use std::sync::Arc;

use crate::error::{AgoraError, AgoraResult};
use crate::exchange::results::{normalize, ResultsSummary};
use crate::exchange::{ExchangeApi, RemotePoll, VoteCredential};
use crate::polls::{LocalPollStore, LocalResults, Poll};
use crate::stamps::StampPool;
use crate::store::{keys, KvStore};

/// What a cast vote produced.
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// Draft vote, tallied locally.
    Local(LocalResults),
    /// Remote vote accepted by the Exchange.
    Remote {
        /// Fresh tallies when the server attached them.
        results: Option<ResultsSummary>,
        /// True when this was a token-authenticated revote.
        revote: bool,
    },
}

#[derive(Clone)]
pub struct VoteClient {
    api: Arc<dyn ExchangeApi>,
    store: KvStore,
    polls: LocalPollStore,
    stamps: StampPool,
}

impl VoteClient {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        store: KvStore,
        polls: LocalPollStore,
        stamps: StampPool,
    ) -> Self {
        Self {
            api,
            store,
            polls,
            stamps,
        }
    }

    /// Cast a vote for `choice` (an option label, or an option id on
    /// remote polls).
    pub async fn cast(&self, poll: &Poll, choice: &str) -> AgoraResult<VoteOutcome> {
        match poll {
            Poll::Draft(draft) => {
                let token = self.polls.ensure_local_token(&draft.local_id)?;
                self.polls
                    .record_vote(&draft.local_id, &token, choice, &draft.options)?;
                self.store
                    .put(&keys::last_choice(&draft.local_id), &choice.to_string())?;
                Ok(VoteOutcome::Local(self.polls.build_results(draft)?))
            }
            Poll::Remote(remote) => {
                let option_id = remote
                    .option_id_for(choice)
                    .ok_or_else(|| AgoraError::InvalidOption(choice.to_string()))?
                    .to_string();
                match self.voter_token(&remote.id)? {
                    Some(token) => self.revote(remote, &option_id, token).await,
                    None => self.first_vote(remote, &option_id).await,
                }
            }
        }
    }

    /// Stored revote credential for a poll, if any.
    pub fn voter_token(&self, poll_id: &str) -> AgoraResult<Option<String>> {
        self.store.get(&keys::voter_token(poll_id))
    }

    async fn revote(
        &self,
        poll: &RemotePoll,
        option_id: &str,
        token: String,
    ) -> AgoraResult<VoteOutcome> {
        match self
            .api
            .cast_vote(&poll.id, option_id, &VoteCredential::VoterToken(token))
            .await
        {
            Ok(receipt) => {
                self.store
                    .put(&keys::last_choice(&poll.id), &option_id.to_string())?;
                Ok(VoteOutcome::Remote {
                    results: receipt.results.as_ref().map(normalize),
                    revote: true,
                })
            }
            Err(AgoraError::InvalidCredential) => {
                // The server no longer honors this token. Drop it so the
                // next attempt takes the stamp path.
                tracing::warn!(poll = %poll.id, "voter token rejected, clearing");
                self.store.remove(&keys::voter_token(&poll.id))?;
                Err(AgoraError::InvalidCredential)
            }
            Err(err) => Err(err),
        }
    }

    async fn first_vote(&self, poll: &RemotePoll, option_id: &str) -> AgoraResult<VoteOutcome> {
        let stamp = self
            .stamps
            .get_or_mint(self.api.as_ref())
            .await?
            .ok_or(AgoraError::StampExhausted)?;

        match self.send_stamp_vote(poll, option_id, stamp).await {
            Ok(outcome) => Ok(outcome),
            Err(AgoraError::InvalidCredential) => {
                // Stale pool: every stamp we hold predates whatever made
                // the server reject this one. Clear, mint once, retry once.
                tracing::warn!(poll = %poll.id, "stamp rejected, clearing pool and retrying once");
                self.stamps.clear()?;
                self.stamps.mint(self.api.as_ref()).await?;
                let stamp = self
                    .stamps
                    .take_one()?
                    .ok_or(AgoraError::StampExhausted)?;
                self.send_stamp_vote(poll, option_id, stamp).await
            }
            Err(err) => Err(err),
        }
    }

    async fn send_stamp_vote(
        &self,
        poll: &RemotePoll,
        option_id: &str,
        stamp: String,
    ) -> AgoraResult<VoteOutcome> {
        let receipt = self
            .api
            .cast_vote(&poll.id, option_id, &VoteCredential::Stamp(stamp))
            .await?;
        if let Some(token) = &receipt.voter_token {
            self.store.put(&keys::voter_token(&poll.id), token)?;
        }
        self.store
            .put(&keys::last_choice(&poll.id), &option_id.to_string())?;
        Ok(VoteOutcome::Remote {
            results: receipt.results.as_ref().map(normalize),
            revote: false,
        })
    }
}
