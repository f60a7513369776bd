//! Wire types for the Exchange HTTP surface.
//!
//! Shape tolerance lives at this boundary: whatever the server sends is
//! decoded into these canonical types exactly once, so the rest of the
//! crate never inspects raw JSON.

use serde::{Deserialize, Serialize};

/// Proof-of-work challenge issued by `GET /identity/challenge`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeSpec {
    pub challenge: String,
    pub difficulty: u32,
}

/// Identity issued by `POST /identity/create`.
#[derive(Clone, Deserialize)]
pub struct IdentityGrant {
    pub self_id: String,
    pub signing_key: String,
    #[serde(default)]
    pub public_alias: Option<String>,
}

/// A poll option with a stable server-assigned ordinal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: String,
    pub label: String,
}

/// Remote poll lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PollStatus {
    #[default]
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
}

/// Correlation metadata carried on polls created through assertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollMeta {
    /// Local draft id this poll was asserted from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_local_id: Option<String>,
    /// Millisecond timestamp of the assertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asserted_at: Option<i64>,
    /// Server-side poll type echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_type: Option<String>,
}

/// An authoritative poll owned by the Exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePoll {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub poll_type: Option<String>,
    #[serde(default)]
    pub status: PollStatus,
    /// Millisecond creation timestamp, when the server supplies one.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub meta: PollMeta,
}

impl RemotePoll {
    /// Resolve a choice given either an option id or a label.
    pub fn option_id_for(&self, choice: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.id == choice || o.label == choice)
            .map(|o| o.id.as_str())
    }
}

/// Canonical payload for `POST /polls`, built from a local draft.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub title: String,
    pub description: Option<String>,
    pub poll_type: String,
    pub options: Vec<String>,
    /// Correlation tag for idempotent merge on repeated asserts.
    pub created_local_id: String,
    pub asserted_at: i64,
}

impl NewPoll {
    /// Wire body the Exchange expects.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "description": self.description.clone().unwrap_or_default(),
            "type": self.poll_type,
            "options": self.options.iter()
                .map(|label| serde_json::json!({ "label": label }))
                .collect::<Vec<_>>(),
            "meta": {
                "poll_type": self.poll_type,
                "created_local_id": self.created_local_id,
                "asserted_at": self.asserted_at,
            },
        })
    }
}

/// Credential accompanying a vote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteCredential {
    /// Single-use anonymous stamp; authorizes exactly one first vote.
    Stamp(String),
    /// Persistent per-poll token; authorizes revotes.
    VoterToken(String),
}

/// Response to `POST /polls/:id/vote`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteReceipt {
    /// Issued on a successful stamp-authenticated first vote.
    #[serde(default)]
    pub voter_token: Option<String>,
    /// Fresh tallies, when the server includes them.
    #[serde(default)]
    pub results: Option<serde_json::Value>,
}

/// Response to `POST /stamp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MintReceipt {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub issued: Vec<String>,
    #[serde(default)]
    pub issued_weights: Option<serde_json::Value>,
    #[serde(default)]
    pub persona_id: Option<String>,
}

/// Event from a poll's live-results stream.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// Full poll snapshot (`event: poll`).
    Snapshot(RemotePoll),
    /// Tally update (`event: results`), already normalized.
    Results(super::results::ResultsSummary),
}
