//! Mock Exchange for tests.
//!
//! Scripted, in-memory implementation of [`ExchangeApi`]: tests preload
//! behavior (mint batches, vote rejections, stream events) and assert on
//! the calls the client made. No network anywhere.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::results::ResultsSummary;
use super::types::*;
use super::{ExchangeApi, PollEventStream};
use crate::error::{AgoraError, AgoraResult};

/// A vote the mock received, for assertions.
#[derive(Debug, Clone)]
pub struct RecordedVote {
    pub poll_id: String,
    pub option_id: String,
    pub credential: VoteCredential,
}

#[derive(Default)]
struct MockState {
    // Scripted behavior
    mint_batch: Vec<String>,
    fail_mint: bool,
    reject_stamp_votes_once: bool,
    reject_stamp_votes_always: bool,
    invalid_voter_tokens: HashSet<String>,
    challenge: Option<ChallengeSpec>,
    grant: Option<(String, String, Option<String>)>,
    stream_events: Option<Vec<PollEvent>>,
    vote_results: Option<serde_json::Value>,

    // Server-side state
    polls: Vec<RemotePoll>,
    next_poll: u64,

    // Recorded calls
    votes: Vec<RecordedVote>,
    mint_calls: usize,
    create_calls: usize,
    list_calls: usize,
    challenge_calls: usize,
}

/// Scripted in-memory Exchange.
#[derive(Clone, Default)]
pub struct MockExchange {
    state: Arc<Mutex<MockState>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock lock poisoned")
    }

    // ---- scripting ----

    /// Stamps returned by every subsequent mint.
    pub fn set_mint_batch(&self, stamps: Vec<String>) {
        self.lock().mint_batch = stamps;
    }

    pub fn fail_mint(&self, fail: bool) {
        self.lock().fail_mint = fail;
    }

    /// Reject the next stamp-authenticated vote as a stale credential.
    pub fn reject_next_stamp_vote(&self) {
        self.lock().reject_stamp_votes_once = true;
    }

    /// Reject every stamp-authenticated vote.
    pub fn reject_all_stamp_votes(&self, reject: bool) {
        self.lock().reject_stamp_votes_always = reject;
    }

    /// Treat `token` as invalid from now on.
    pub fn invalidate_voter_token(&self, token: &str) {
        self.lock().invalid_voter_tokens.insert(token.to_string());
    }

    pub fn set_challenge(&self, challenge: &str, difficulty: u32) {
        self.lock().challenge = Some(ChallengeSpec {
            challenge: challenge.to_string(),
            difficulty,
        });
    }

    pub fn set_identity_grant(&self, self_id: &str, signing_key: &str, alias: Option<&str>) {
        self.lock().grant = Some((
            self_id.to_string(),
            signing_key.to_string(),
            alias.map(str::to_string),
        ));
    }

    /// Preload a poll into the remote index.
    pub fn add_remote_poll(&self, poll: RemotePoll) {
        self.lock().polls.push(poll);
    }

    /// Events the results stream will replay; `None` means 404 (no stream).
    pub fn set_stream_events(&self, events: Vec<PollEvent>) {
        self.lock().stream_events = Some(events);
    }

    /// Results payload attached to vote receipts.
    pub fn set_vote_results(&self, results: serde_json::Value) {
        self.lock().vote_results = Some(results);
    }

    // ---- assertions ----

    pub fn votes(&self) -> Vec<RecordedVote> {
        self.lock().votes.clone()
    }

    pub fn mint_calls(&self) -> usize {
        self.lock().mint_calls
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn challenge_calls(&self) -> usize {
        self.lock().challenge_calls
    }

    pub fn remote_polls(&self) -> Vec<RemotePoll> {
        self.lock().polls.clone()
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn health(&self) -> AgoraResult<bool> {
        Ok(true)
    }

    async fn list_polls(&self) -> AgoraResult<Vec<RemotePoll>> {
        let mut state = self.lock();
        state.list_calls += 1;
        Ok(state.polls.clone())
    }

    async fn create_poll(&self, poll: &NewPoll) -> AgoraResult<RemotePoll> {
        let mut state = self.lock();
        state.create_calls += 1;
        let n = state.next_poll;
        state.next_poll += 1;
        let created = RemotePoll {
            id: format!("poll-{n}"),
            title: poll.title.clone(),
            description: poll.description.clone(),
            options: poll
                .options
                .iter()
                .enumerate()
                .map(|(i, label)| PollOption {
                    id: format!("opt-{i}"),
                    label: label.clone(),
                })
                .collect(),
            poll_type: Some(poll.poll_type.clone()),
            status: PollStatus::Open,
            created_at: Some(poll.asserted_at),
            meta: PollMeta {
                created_local_id: Some(poll.created_local_id.clone()),
                asserted_at: Some(poll.asserted_at),
                poll_type: Some(poll.poll_type.clone()),
            },
        };
        state.polls.push(created.clone());
        Ok(created)
    }

    async fn cast_vote(
        &self,
        poll_id: &str,
        option_id: &str,
        credential: &VoteCredential,
    ) -> AgoraResult<VoteReceipt> {
        let mut state = self.lock();
        state.votes.push(RecordedVote {
            poll_id: poll_id.to_string(),
            option_id: option_id.to_string(),
            credential: credential.clone(),
        });

        match credential {
            VoteCredential::Stamp(_) => {
                if state.reject_stamp_votes_once {
                    state.reject_stamp_votes_once = false;
                    return Err(AgoraError::InvalidCredential);
                }
                if state.reject_stamp_votes_always {
                    return Err(AgoraError::InvalidCredential);
                }
                Ok(VoteReceipt {
                    voter_token: Some(format!("vt-{poll_id}")),
                    results: state.vote_results.clone(),
                })
            }
            VoteCredential::VoterToken(token) => {
                if state.invalid_voter_tokens.contains(token) {
                    return Err(AgoraError::InvalidCredential);
                }
                Ok(VoteReceipt {
                    voter_token: None,
                    results: state.vote_results.clone(),
                })
            }
        }
    }

    async fn fetch_challenge(&self) -> AgoraResult<ChallengeSpec> {
        let mut state = self.lock();
        state.challenge_calls += 1;
        Ok(state.challenge.clone().unwrap_or(ChallengeSpec {
            challenge: "mock-challenge".to_string(),
            difficulty: 0,
        }))
    }

    async fn create_identity(&self, _challenge: &str, _nonce: &str) -> AgoraResult<IdentityGrant> {
        let state = self.lock();
        let (self_id, signing_key, alias) = state
            .grant
            .clone()
            .unwrap_or(("mock-self".to_string(), "mock-key".to_string(), None));
        Ok(IdentityGrant {
            self_id,
            signing_key,
            public_alias: alias,
        })
    }

    async fn mint_stamps(&self) -> AgoraResult<MintReceipt> {
        let mut state = self.lock();
        state.mint_calls += 1;
        if state.fail_mint {
            return Err(AgoraError::Network("mock mint failure".into()));
        }
        Ok(MintReceipt {
            ok: true,
            issued: state.mint_batch.clone(),
            issued_weights: None,
            persona_id: None,
        })
    }

    async fn stream_results(&self, _poll_id: &str) -> AgoraResult<Option<PollEventStream>> {
        let events = self.lock().stream_events.clone();
        Ok(events.map(|events| {
            Box::pin(futures::stream::iter(events.into_iter().map(Ok))) as PollEventStream
        }))
    }
}

/// Convenience: a summary with just totals, for scripted streams.
pub fn summary_with_totals(pairs: &[(&str, f64)]) -> ResultsSummary {
    ResultsSummary {
        totals: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        represented_weight: pairs.iter().map(|(_, v)| v).sum(),
        ..Default::default()
    }
}
