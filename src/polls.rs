//! Poll model and the device-local draft store.
//!
//! A poll the client holds is either a local draft awaiting assertion or an
//! authoritative remote poll — never both, and never a string-prefix hybrid:
//! the distinction is a tagged union.
//!
//! Draft tallies live next to the drafts. The tally invariant is that the
//! sum of per-label counts always equals the number of distinct tokens with
//! a recorded vote; a re-vote moves one count, never duplicates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgoraError, AgoraResult};
use crate::exchange::RemotePoll;
use crate::store::{keys, KvStore};

/// A local draft poll, pending assertion to the Exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPoll {
    pub local_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Bare labels; the Exchange assigns stable option ids at assertion.
    pub options: Vec<String>,
    pub poll_type: String,
    /// Millisecond creation timestamp.
    pub created_at: i64,
}

impl DraftPoll {
    pub fn new(
        title: String,
        description: Option<String>,
        options: Vec<String>,
        poll_type: String,
        created_at: i64,
    ) -> Self {
        Self {
            local_id: Uuid::new_v4().to_string(),
            title,
            description,
            options,
            poll_type,
            created_at,
        }
    }
}

/// Any poll the client can show or vote on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Poll {
    Draft(DraftPoll),
    Remote(RemotePoll),
}

impl Poll {
    pub fn id(&self) -> &str {
        match self {
            Poll::Draft(d) => &d.local_id,
            Poll::Remote(r) => &r.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Poll::Draft(d) => &d.title,
            Poll::Remote(r) => &r.title,
        }
    }
}

/// Per-draft tally: which token voted for what, and counts per label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteState {
    pub by_token: BTreeMap<String, String>,
    pub counts: BTreeMap<String, u64>,
}

impl VoteState {
    /// Record `token`'s vote for `choice`.
    ///
    /// Idempotent for a repeated `(token, choice)` pair. A changed vote
    /// decrements the old label and increments the new one in one mutation,
    /// so the invariant `sum(counts) == distinct voters` holds at every
    /// externally observable point. Returns whether anything changed.
    pub fn record(&mut self, token: &str, choice: &str, known_options: &[String]) -> AgoraResult<bool> {
        if !known_options.iter().any(|o| o == choice) {
            return Err(AgoraError::InvalidOption(choice.to_string()));
        }

        match self.by_token.get(token) {
            Some(previous) if previous == choice => Ok(false),
            Some(previous) => {
                let previous = previous.clone();
                if let Some(count) = self.counts.get_mut(&previous) {
                    *count = count.saturating_sub(1);
                }
                *self.counts.entry(choice.to_string()).or_insert(0) += 1;
                self.by_token.insert(token.to_string(), choice.to_string());
                Ok(true)
            }
            None => {
                *self.counts.entry(choice.to_string()).or_insert(0) += 1;
                self.by_token.insert(token.to_string(), choice.to_string());
                Ok(true)
            }
        }
    }

    /// Number of distinct tokens with a recorded vote.
    pub fn total_votes(&self) -> u64 {
        self.by_token.len() as u64
    }
}

/// Results projection for a draft poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalResults {
    pub poll_id: String,
    pub total_votes: u64,
    /// Every option appears, zero-filled when nobody picked it.
    pub counts: BTreeMap<String, u64>,
}

/// CRUD over draft polls and their tallies, insertion order preserved
/// (most recent first).
#[derive(Clone)]
pub struct LocalPollStore {
    store: KvStore,
}

impl LocalPollStore {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Insert a new draft at the front of the listing.
    pub fn add(&self, draft: &DraftPoll) -> AgoraResult<()> {
        let mut drafts = self.list()?;
        drafts.insert(0, draft.clone());
        self.store.put(keys::LOCAL_POLLS, &drafts)
    }

    /// Remove a draft and its vote state. Credentials and hints are the
    /// caller's to purge (see `sync::purge_draft`).
    pub fn remove(&self, local_id: &str) -> AgoraResult<()> {
        let mut drafts = self.list()?;
        drafts.retain(|d| d.local_id != local_id);
        self.store.put(keys::LOCAL_POLLS, &drafts)?;

        let mut states = self.vote_states()?;
        if states.remove(local_id).is_some() {
            self.store.put(keys::VOTE_STATES, &states)?;
        }
        Ok(())
    }

    pub fn get(&self, local_id: &str) -> AgoraResult<Option<DraftPoll>> {
        Ok(self.list()?.into_iter().find(|d| d.local_id == local_id))
    }

    /// All drafts, most recent first.
    pub fn list(&self) -> AgoraResult<Vec<DraftPoll>> {
        Ok(self.store.get(keys::LOCAL_POLLS)?.unwrap_or_default())
    }

    /// Apply a vote to a draft's tally and persist the updated state.
    pub fn record_vote(
        &self,
        poll_id: &str,
        token: &str,
        choice: &str,
        known_options: &[String],
    ) -> AgoraResult<()> {
        let mut states = self.vote_states()?;
        let state = states.entry(poll_id.to_string()).or_default();
        if state.record(token, choice, known_options)? {
            self.store.put(keys::VOTE_STATES, &states)?;
        }
        Ok(())
    }

    /// The tally for one draft (empty if nobody voted yet).
    pub fn vote_state(&self, poll_id: &str) -> AgoraResult<VoteState> {
        Ok(self.vote_states()?.remove(poll_id).unwrap_or_default())
    }

    /// Pure projection of a draft's tally, zero-filled per option.
    pub fn build_results(&self, draft: &DraftPoll) -> AgoraResult<LocalResults> {
        let state = self.vote_state(&draft.local_id)?;
        let mut counts: BTreeMap<String, u64> =
            draft.options.iter().map(|o| (o.clone(), 0)).collect();
        for (label, n) in &state.counts {
            counts.insert(label.clone(), *n);
        }
        Ok(LocalResults {
            poll_id: draft.local_id.clone(),
            total_votes: state.total_votes(),
            counts,
        })
    }

    /// Stable per-poll, per-device voting token for drafts; created once.
    pub fn ensure_local_token(&self, poll_id: &str) -> AgoraResult<String> {
        let key = keys::local_token(poll_id);
        if let Some(token) = self.store.get::<String>(&key)? {
            return Ok(token);
        }
        let token = Uuid::new_v4().to_string();
        self.store.put(&key, &token)?;
        Ok(token)
    }

    fn vote_states(&self) -> AgoraResult<BTreeMap<String, VoteState>> {
        Ok(self.store.get(keys::VOTE_STATES)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lunch_draft() -> DraftPoll {
        DraftPoll::new(
            "Lunch?".into(),
            None,
            vec!["Pizza".into(), "Tacos".into()],
            "single".into(),
            1_700_000_000_000,
        )
    }

    #[test]
    fn listing_is_most_recent_first() {
        let polls = LocalPollStore::new(KvStore::in_memory());
        let a = lunch_draft();
        let b = lunch_draft();
        polls.add(&a).unwrap();
        polls.add(&b).unwrap();
        let listed = polls.list().unwrap();
        assert_eq!(listed[0].local_id, b.local_id);
        assert_eq!(listed[1].local_id, a.local_id);
    }

    #[test]
    fn lunch_scenario_single_vote() {
        let polls = LocalPollStore::new(KvStore::in_memory());
        let draft = lunch_draft();
        polls.add(&draft).unwrap();

        let token = polls.ensure_local_token(&draft.local_id).unwrap();
        polls
            .record_vote(&draft.local_id, &token, "Pizza", &draft.options)
            .unwrap();

        let results = polls.build_results(&draft).unwrap();
        assert_eq!(results.total_votes, 1);
        assert_eq!(results.counts.get("Pizza"), Some(&1));
        assert_eq!(results.counts.get("Tacos"), Some(&0));
    }

    #[test]
    fn revote_moves_the_count() {
        let draft = lunch_draft();
        let mut state = VoteState::default();
        state.record("t1", "Pizza", &draft.options).unwrap();
        state.record("t1", "Tacos", &draft.options).unwrap();
        assert_eq!(state.counts.get("Pizza"), Some(&0));
        assert_eq!(state.counts.get("Tacos"), Some(&1));
        assert_eq!(state.total_votes(), 1);
    }

    #[test]
    fn same_vote_twice_is_idempotent() {
        let draft = lunch_draft();
        let mut state = VoteState::default();
        assert!(state.record("t1", "Pizza", &draft.options).unwrap());
        assert!(!state.record("t1", "Pizza", &draft.options).unwrap());
        assert_eq!(state.counts.get("Pizza"), Some(&1));
    }

    #[test]
    fn unknown_choice_is_rejected() {
        let draft = lunch_draft();
        let mut state = VoteState::default();
        assert!(matches!(
            state.record("t1", "Sushi", &draft.options),
            Err(AgoraError::InvalidOption(_))
        ));
        assert_eq!(state.total_votes(), 0);
    }

    #[test]
    fn local_token_is_stable() {
        let polls = LocalPollStore::new(KvStore::in_memory());
        let a = polls.ensure_local_token("p1").unwrap();
        let b = polls.ensure_local_token("p1").unwrap();
        let other = polls.ensure_local_token("p2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn remove_drops_draft_and_tally() {
        let polls = LocalPollStore::new(KvStore::in_memory());
        let draft = lunch_draft();
        polls.add(&draft).unwrap();
        polls
            .record_vote(&draft.local_id, "t1", "Pizza", &draft.options)
            .unwrap();

        polls.remove(&draft.local_id).unwrap();
        assert!(polls.get(&draft.local_id).unwrap().is_none());
        assert_eq!(polls.vote_state(&draft.local_id).unwrap().total_votes(), 0);
    }

    proptest! {
        // sum(counts) == distinct voting tokens, across arbitrary
        // re-vote sequences.
        #[test]
        fn prop_tally_invariant(votes in proptest::collection::vec((0u8..8, 0u8..3), 0..64)) {
            let options = vec!["A".to_string(), "B".to_string(), "C".to_string()];
            let mut state = VoteState::default();
            for (token_n, choice_n) in votes {
                let token = format!("token-{token_n}");
                state.record(&token, &options[choice_n as usize], &options).unwrap();
                let sum: u64 = state.counts.values().sum();
                prop_assert_eq!(sum, state.by_token.len() as u64);
            }
        }
    }
}
