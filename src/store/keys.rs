//! Fixed key namespace for the device-local store.
//!
//! Every component reads and writes only its own keys; nothing reaches
//! across another component's namespace.

/// Identity record (self id, signing key, alias).
pub const IDENTITY: &str = "identity/record";

/// Unconsumed anonymous voting stamps.
pub const STAMP_POOL: &str = "stamps/pool";

/// Ordered list of local draft polls, most recent first.
pub const LOCAL_POLLS: &str = "polls/drafts";

/// Map of draft poll id to its vote state.
pub const VOTE_STATES: &str = "polls/vote-states";

/// Cached Exchange base URL last used.
pub const EXCHANGE_BASE_URL: &str = "exchange/base-url";

/// Per-poll persistent voter token (remote revote credential).
pub fn voter_token(poll_id: &str) -> String {
    format!("credentials/voter-token/{poll_id}")
}

/// Per-poll stable local voting token for drafts.
pub fn local_token(poll_id: &str) -> String {
    format!("credentials/local-token/{poll_id}")
}

/// Last option the device chose on a poll (UI preselection hint).
pub fn last_choice(poll_id: &str) -> String {
    format!("hints/last-choice/{poll_id}")
}
