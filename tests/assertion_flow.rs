//! Integration test for the draft-to-live assertion flow.
//!
//! The lifecycle under test:
//! 1. enroll an identity
//! 2. create a local draft and vote on it
//! 3. assert the draft to the Exchange
//! 4. the vote is carried forward with a stamp credential
//! 5. local state is purged; the remote poll is the sole source of truth
//! 6. repeating the assert never duplicates the poll

use std::sync::Arc;

use agora::config::AgoraConfig;
use agora::error::AgoraError;
use agora::exchange::mock::MockExchange;
use agora::exchange::VoteCredential;
use agora::polls::Poll;
use agora::session::Session;
use agora::store::KvStore;
use agora::sync::VoteCarry;

fn session(mock: &MockExchange) -> Session {
    Session::with_exchange(
        AgoraConfig::default(),
        KvStore::in_memory(),
        Arc::new(mock.clone()),
    )
    .unwrap()
}

#[tokio::test]
async fn full_assert_with_vote_carry() {
    let mock = MockExchange::new();
    mock.set_mint_batch(vec!["stamp-a".into()]);
    let session = session(&mock);
    session.enroll(None, false).await.unwrap();

    let draft = session
        .create_draft(
            "Lunch?".into(),
            Some("pick one".into()),
            vec!["Pizza".into(), "Tacos".into()],
            "single".into(),
        )
        .unwrap();
    session.cast_vote(&draft.local_id, "Tacos").await.unwrap();

    let outcome = session.assert_draft(&draft.local_id).await.unwrap();
    assert_eq!(outcome.vote_carry, VoteCarry::Carried);
    assert_eq!(outcome.poll.title, "Lunch?");
    assert_eq!(
        outcome.poll.meta.created_local_id.as_deref(),
        Some(draft.local_id.as_str())
    );

    // The carried vote used a stamp and targeted the option matching the
    // local choice.
    let votes = mock.votes();
    assert_eq!(votes.len(), 1);
    assert!(matches!(votes[0].credential, VoteCredential::Stamp(_)));
    let tacos_id = outcome.poll.option_id_for("Tacos").unwrap();
    assert_eq!(votes[0].option_id, tacos_id);

    // Local draft is gone; only the remote poll remains in listings.
    let polls = session.polls().await.unwrap();
    assert_eq!(polls.len(), 1);
    assert!(matches!(polls[0], Poll::Remote(_)));
}

#[tokio::test]
async fn assert_without_identity_touches_nothing_remote() {
    let mock = MockExchange::new();
    let session = session(&mock);

    let draft = session
        .create_draft(
            "Lunch?".into(),
            None,
            vec!["Pizza".into(), "Tacos".into()],
            "single".into(),
        )
        .unwrap();

    let err = session.assert_draft(&draft.local_id).await.unwrap_err();
    assert!(matches!(err, AgoraError::IdentityMissing));

    // Draft intact, zero remote calls of any kind.
    assert_eq!(session.polls().await.unwrap().len(), 1);
    assert_eq!(mock.create_calls(), 0);
    assert_eq!(mock.mint_calls(), 0);
    assert!(mock.votes().is_empty());
}

#[tokio::test]
async fn double_assert_yields_exactly_one_remote_poll() {
    let mock = MockExchange::new();
    mock.set_mint_batch(vec!["s1".into(), "s2".into()]);
    let session = session(&mock);
    session.enroll(None, false).await.unwrap();

    let draft = session
        .create_draft(
            "Quorum rules".into(),
            None,
            vec!["Keep".into(), "Change".into()],
            "single".into(),
        )
        .unwrap();

    let first = session.assert_draft(&draft.local_id).await.unwrap();

    // A client that lost the purge (crash between create and cleanup)
    // retries with the same correlation id.
    let redraft = agora::polls::DraftPoll {
        local_id: draft.local_id.clone(),
        title: draft.title.clone(),
        description: None,
        options: draft.options.clone(),
        poll_type: draft.poll_type.clone(),
        created_at: draft.created_at,
    };
    // Re-add through a fresh session sharing the same mock Exchange.
    let retry_session = session_with_draft(&mock, &redraft).await;
    let second = retry_session
        .assert_draft(&redraft.local_id)
        .await
        .unwrap();

    assert_eq!(first.poll.id, second.poll.id);
    assert_eq!(mock.create_calls(), 1, "merge, not duplicate creation");
    assert_eq!(mock.remote_polls().len(), 1);
}

async fn session_with_draft(mock: &MockExchange, draft: &agora::polls::DraftPoll) -> Session {
    let store = KvStore::in_memory();
    let polls = agora::polls::LocalPollStore::new(store.clone());
    polls.add(draft).unwrap();
    let session =
        Session::with_exchange(AgoraConfig::default(), store, Arc::new(mock.clone())).unwrap();
    session.enroll(None, false).await.unwrap();
    session
}

#[tokio::test]
async fn partial_success_is_surfaced_and_not_rolled_back() {
    let mock = MockExchange::new();
    mock.fail_mint(true); // no stamps can ever be minted
    let session = session(&mock);
    session.enroll(None, false).await.unwrap();

    let draft = session
        .create_draft(
            "Lunch?".into(),
            None,
            vec!["Pizza".into(), "Tacos".into()],
            "single".into(),
        )
        .unwrap();
    session.cast_vote(&draft.local_id, "Pizza").await.unwrap();

    let outcome = session.assert_draft(&draft.local_id).await.unwrap();
    assert!(matches!(outcome.vote_carry, VoteCarry::Failed(_)));
    // The created poll stays; the draft is still purged.
    assert_eq!(mock.remote_polls().len(), 1);
    let polls = session.polls().await.unwrap();
    assert!(polls.iter().all(|p| matches!(p, Poll::Remote(_))));
}
