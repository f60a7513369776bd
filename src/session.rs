//! Session: the one context object behind every command.
//!
//! Built once at startup, torn down at shutdown. Owns the device store,
//! the Exchange client, and every component over them; the presentation
//! layer calls these methods and renders what comes back. There is no
//! global mutable state and the core never registers UI callbacks.

use std::sync::Arc;

use crate::config::AgoraConfig;
use crate::error::{AgoraError, AgoraResult};
use crate::exchange::http::HttpExchange;
use crate::exchange::results::ResultsSummary;
use crate::exchange::{ExchangeApi, PollEvent, PollEventStream};
use crate::identity::{self, Identity, IdentityStore};
use crate::polls::{DraftPoll, LocalPollStore, LocalResults, Poll};
use crate::signing::{now_ms, RequestSigner};
use crate::stamps::StampPool;
use crate::store::{keys, KvStore};
use crate::sync::{AssertOutcome, AssertionSync};
use crate::vote::{VoteClient, VoteOutcome};

use futures::StreamExt;

/// Results for any poll, local or remote.
#[derive(Debug, Clone)]
pub enum ResultsView {
    Local(LocalResults),
    /// `None` when the poll has no live results available right now.
    Remote(Option<ResultsSummary>),
}

pub struct Session {
    config: AgoraConfig,
    store: KvStore,
    api: Arc<dyn ExchangeApi>,
    identities: IdentityStore,
    polls: LocalPollStore,
    stamps: StampPool,
    votes: VoteClient,
    sync: AssertionSync,
}

impl Session {
    /// Open a session against the configured Exchange with the on-disk
    /// device store.
    pub fn open(config: AgoraConfig) -> AgoraResult<Self> {
        let store = KvStore::open(&config.store.path)?;
        let identities = IdentityStore::new(store.clone());
        let signer = RequestSigner::new(identities.clone());
        let api: Arc<dyn ExchangeApi> = Arc::new(HttpExchange::new(
            config.exchange.base_url.clone(),
            config.exchange.path_prefix.clone(),
            signer,
        )?);
        Self::with_exchange(config, store, api)
    }

    /// Wire a session over any Exchange implementation (tests use the mock).
    pub fn with_exchange(
        config: AgoraConfig,
        store: KvStore,
        api: Arc<dyn ExchangeApi>,
    ) -> AgoraResult<Self> {
        let identities = IdentityStore::new(store.clone());
        let polls = LocalPollStore::new(store.clone());
        let stamps = StampPool::new(store.clone(), identities.clone());
        let votes = VoteClient::new(api.clone(), store.clone(), polls.clone(), stamps.clone());
        let sync = AssertionSync::new(
            api.clone(),
            store.clone(),
            identities.clone(),
            polls.clone(),
            stamps.clone(),
            votes.clone(),
        );
        store.put(keys::EXCHANGE_BASE_URL, &config.exchange.base_url)?;
        Ok(Self {
            config,
            store,
            api,
            identities,
            polls,
            stamps,
            votes,
            sync,
        })
    }

    pub fn config(&self) -> &AgoraConfig {
        &self.config
    }

    /// Liveness of the remote Exchange.
    pub async fn health(&self) -> AgoraResult<bool> {
        self.api.health().await
    }

    /// The device identity, if enrolled.
    pub fn identity(&self) -> AgoraResult<Option<Identity>> {
        self.identities.get()
    }

    /// Enroll this device: challenge, proof-of-work, identity creation.
    pub async fn enroll(&self, alias: Option<String>, replace: bool) -> AgoraResult<Identity> {
        identity::enroll(self.api.as_ref(), &self.identities, alias, replace).await
    }

    /// Number of unconsumed stamps pooled on this device.
    pub fn stamp_reserve(&self) -> AgoraResult<usize> {
        self.stamps.len()
    }

    /// Create a local draft poll. Stays on the device until asserted.
    pub fn create_draft(
        &self,
        title: String,
        description: Option<String>,
        options: Vec<String>,
        poll_type: String,
    ) -> AgoraResult<DraftPoll> {
        if title.trim().is_empty() {
            return Err(AgoraError::InvalidOption("a poll needs a title".into()));
        }
        if options.len() < 2 {
            return Err(AgoraError::InvalidOption(
                "a poll needs at least two options".into(),
            ));
        }
        let draft = DraftPoll::new(title, description, options, poll_type, now_ms());
        self.polls.add(&draft)?;
        Ok(draft)
    }

    /// Everything votable: local drafts first (most recent first), then
    /// the remote index.
    pub async fn polls(&self) -> AgoraResult<Vec<Poll>> {
        let mut all: Vec<Poll> = self.polls.list()?.into_iter().map(Poll::Draft).collect();
        all.extend(self.api.list_polls().await?.into_iter().map(Poll::Remote));
        Ok(all)
    }

    /// Find a poll by local draft id or remote poll id.
    pub async fn find_poll(&self, poll_id: &str) -> AgoraResult<Option<Poll>> {
        if let Some(draft) = self.polls.get(poll_id)? {
            return Ok(Some(Poll::Draft(draft)));
        }
        Ok(self
            .api
            .list_polls()
            .await?
            .into_iter()
            .find(|p| p.id == poll_id)
            .map(Poll::Remote))
    }

    /// Cast a vote on any poll by id.
    pub async fn cast_vote(&self, poll_id: &str, choice: &str) -> AgoraResult<VoteOutcome> {
        let poll = self
            .find_poll(poll_id)
            .await?
            .ok_or_else(|| AgoraError::Store(format!("no poll with id {poll_id}")))?;
        self.votes.cast(&poll, choice).await
    }

    /// Promote a draft to the Exchange.
    pub async fn assert_draft(&self, local_id: &str) -> AgoraResult<AssertOutcome> {
        self.sync.assert_draft(local_id).await
    }

    /// Current results for a poll. Drafts project the local tally; remote
    /// polls take the first tally pushed on the live stream, when one
    /// exists.
    pub async fn results(&self, poll_id: &str) -> AgoraResult<ResultsView> {
        match self
            .find_poll(poll_id)
            .await?
            .ok_or_else(|| AgoraError::Store(format!("no poll with id {poll_id}")))?
        {
            Poll::Draft(draft) => Ok(ResultsView::Local(self.polls.build_results(&draft)?)),
            Poll::Remote(remote) => {
                let Some(mut stream) = self.api.stream_results(&remote.id).await? else {
                    return Ok(ResultsView::Remote(None));
                };
                while let Some(event) = stream.next().await {
                    if let PollEvent::Results(summary) = event? {
                        return Ok(ResultsView::Remote(Some(summary)));
                    }
                }
                Ok(ResultsView::Remote(None))
            }
        }
    }

    /// Subscribe to a remote poll's live events. `None` when the Exchange
    /// offers no stream for it. Not auto-reconnected: when the stream
    /// ends, call again to resubscribe.
    pub async fn watch(&self, poll_id: &str) -> AgoraResult<Option<PollEventStream>> {
        self.api.stream_results(poll_id).await
    }

    /// Direct store access for presentation hints (last chosen option).
    pub fn last_choice(&self, poll_id: &str) -> AgoraResult<Option<String>> {
        self.store.get(&keys::last_choice(poll_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::mock::{summary_with_totals, MockExchange};
    use crate::exchange::{PollMeta, PollOption, PollStatus, RemotePoll};

    fn session(mock: &MockExchange) -> Session {
        Session::with_exchange(
            AgoraConfig::default(),
            KvStore::in_memory(),
            Arc::new(mock.clone()),
        )
        .unwrap()
    }

    fn remote_poll(id: &str) -> RemotePoll {
        RemotePoll {
            id: id.into(),
            title: format!("poll {id}"),
            description: None,
            options: vec![PollOption {
                id: "opt-0".into(),
                label: "Yes".into(),
            }],
            poll_type: None,
            status: PollStatus::Open,
            created_at: None,
            meta: PollMeta::default(),
        }
    }

    #[tokio::test]
    async fn listing_puts_drafts_before_remote_polls() {
        let mock = MockExchange::new();
        mock.add_remote_poll(remote_poll("poll-r"));
        let session = session(&mock);
        session
            .create_draft(
                "Draft".into(),
                None,
                vec!["A".into(), "B".into()],
                "single".into(),
            )
            .unwrap();

        let polls = session.polls().await.unwrap();
        assert_eq!(polls.len(), 2);
        assert!(matches!(polls[0], Poll::Draft(_)));
        assert!(matches!(polls[1], Poll::Remote(_)));
    }

    #[tokio::test]
    async fn draft_needs_two_options() {
        let mock = MockExchange::new();
        let session = session(&mock);
        let err = session
            .create_draft("One".into(), None, vec!["only".into()], "single".into())
            .unwrap_err();
        assert!(matches!(err, AgoraError::InvalidOption(_)));
    }

    #[tokio::test]
    async fn results_for_remote_poll_come_from_the_stream() {
        let mock = MockExchange::new();
        mock.add_remote_poll(remote_poll("poll-r"));
        mock.set_stream_events(vec![
            PollEvent::Snapshot(remote_poll("poll-r")),
            PollEvent::Results(summary_with_totals(&[("opt-0", 4.0)])),
        ]);
        let session = session(&mock);

        match session.results("poll-r").await.unwrap() {
            ResultsView::Remote(Some(summary)) => {
                assert_eq!(summary.totals.get("opt-0"), Some(&4.0))
            }
            other => panic!("expected remote results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn results_unavailable_is_not_an_error() {
        let mock = MockExchange::new();
        mock.add_remote_poll(remote_poll("poll-r"));
        let session = session(&mock);
        assert!(matches!(
            session.results("poll-r").await.unwrap(),
            ResultsView::Remote(None)
        ));
    }
}
