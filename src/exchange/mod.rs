//! Remote Exchange surface.
//!
//! [`ExchangeApi`] abstracts every network operation the client performs,
//! so all protocol logic (voting, assertion, enrollment) is testable
//! against [`mock::MockExchange`] without a network. The production
//! implementation is [`http::HttpExchange`].

pub mod http;
pub mod mock;
pub mod results;
pub mod types;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::AgoraResult;
pub use types::{
    ChallengeSpec, IdentityGrant, MintReceipt, NewPoll, PollEvent, PollMeta, PollOption,
    PollStatus, RemotePoll, VoteCredential, VoteReceipt,
};

/// Live-results subscription: a long-lived server-push stream.
///
/// On transport error the stream yields one `Err` and ends; it is never
/// auto-reconnected. Re-opening a poll view resubscribes.
pub type PollEventStream = Pin<Box<dyn Stream<Item = AgoraResult<PollEvent>> + Send>>;

/// Operations the remote Exchange offers the client.
///
/// Privileged operations (`create_poll`, `mint_stamps`) are signed by the
/// implementation; callers must ensure an identity exists first.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// `GET /health` — liveness probe, unauthenticated.
    async fn health(&self) -> AgoraResult<bool>;

    /// `GET /polls` — authoritative poll index. Tolerates both a bare
    /// array and a `{polls: [...]}` wrapper.
    async fn list_polls(&self) -> AgoraResult<Vec<RemotePoll>>;

    /// `POST /polls` — signed creation of a remote poll.
    async fn create_poll(&self, poll: &NewPoll) -> AgoraResult<RemotePoll>;

    /// `POST /polls/:id/vote` — cast a vote with a stamp (first vote) or a
    /// voter token (revote). Credential rejections surface as
    /// [`crate::error::AgoraError::InvalidCredential`].
    async fn cast_vote(
        &self,
        poll_id: &str,
        option_id: &str,
        credential: &VoteCredential,
    ) -> AgoraResult<VoteReceipt>;

    /// `GET /identity/challenge`.
    async fn fetch_challenge(&self) -> AgoraResult<ChallengeSpec>;

    /// `POST /identity/create` with a solved challenge.
    async fn create_identity(&self, challenge: &str, nonce: &str) -> AgoraResult<IdentityGrant>;

    /// `POST /stamp` — signed minting of anonymous voting stamps.
    async fn mint_stamps(&self) -> AgoraResult<MintReceipt>;

    /// `GET /polls/:id/stream` — live results. `Ok(None)` when the server
    /// has no stream for a valid poll (a legitimate outcome, not an error).
    async fn stream_results(&self, poll_id: &str) -> AgoraResult<Option<PollEventStream>>;
}
