//! HTTP implementation of the Exchange surface.
//!
//! One reqwest client, one base URL, one fixed API path prefix. The path
//! handed to the request signer is the same string appended to the base
//! URL, so the signature always covers exactly the path the server sees.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use super::results;
use super::types::*;
use super::{ExchangeApi, PollEventStream};
use crate::error::{AgoraError, AgoraResult};
use crate::signing::{
    RequestSigner, SignedRequest, HEADER_NONCE, HEADER_SELF_ID, HEADER_SIGNATURE, HEADER_STAMP,
    HEADER_TIMESTAMP, HEADER_VOTER_TOKEN,
};

/// Production Exchange client.
pub struct HttpExchange {
    client: reqwest::Client,
    base_url: String,
    path_prefix: String,
    signer: RequestSigner,
}

impl HttpExchange {
    /// `base_url` without trailing slash, `path_prefix` like "/api".
    pub fn new(base_url: String, path_prefix: String, signer: RequestSigner) -> AgoraResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AgoraError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path_prefix,
            signer,
        })
    }

    /// The path as the server reconstructs it for signature checks.
    fn signed_path(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, self.signed_path(path))
    }

    fn attach(req: reqwest::RequestBuilder, signed: &SignedRequest) -> reqwest::RequestBuilder {
        req.header(HEADER_SELF_ID, signed.self_id.as_str())
            .header(HEADER_TIMESTAMP, signed.timestamp_ms.to_string())
            .header(HEADER_NONCE, signed.nonce.as_str())
            .header(HEADER_SIGNATURE, signed.signature.as_str())
    }
}

async fn status_and_body(resp: reqwest::Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    (status, body)
}

fn api_error(context: &str, status: u16, body: &str) -> AgoraError {
    AgoraError::Api(format!("{context}: status {status}: {body}"))
}

#[async_trait]
impl ExchangeApi for HttpExchange {
    async fn health(&self) -> AgoraResult<bool> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Ok(resp.status().is_success())
    }

    async fn list_polls(&self) -> AgoraResult<Vec<RemotePoll>> {
        let resp = self.client.get(self.url("/polls")).send().await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(api_error("list polls", status, &body));
        }
        let value: serde_json::Value = resp.json().await?;
        Ok(decode_poll_index(&value))
    }

    async fn create_poll(&self, poll: &NewPoll) -> AgoraResult<RemotePoll> {
        let path = self.signed_path("/polls");
        let body = poll.to_body();
        let signed = self.signer.sign("POST", &path, Some(&body))?;

        let req = self.client.post(self.url("/polls")).json(&body);
        let resp = Self::attach(req, &signed).send().await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(api_error("create poll", status, &body));
        }
        let value: serde_json::Value = resp.json().await?;
        // Response is {poll: {...}}; tolerate a bare poll object too.
        let poll_value = value.get("poll").unwrap_or(&value);
        serde_json::from_value(poll_value.clone())
            .map_err(|e| AgoraError::Api(format!("create poll: bad poll shape: {e}")))
    }

    async fn cast_vote(
        &self,
        poll_id: &str,
        option_id: &str,
        credential: &VoteCredential,
    ) -> AgoraResult<VoteReceipt> {
        let body = serde_json::json!({ "option_id": option_id });
        let req = self
            .client
            .post(self.url(&format!("/polls/{poll_id}/vote")))
            .json(&body);
        let req = match credential {
            VoteCredential::Stamp(stamp) => req.header(HEADER_STAMP, stamp.as_str()),
            VoteCredential::VoterToken(token) => req.header(HEADER_VOTER_TOKEN, token.as_str()),
        };

        let resp = req.send().await?;
        let status = resp.status();
        // Credential-class rejections get their own variant so the caller
        // can clear the offending credential and fall back.
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AgoraError::InvalidCredential);
        }
        if !status.is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(api_error("cast vote", status, &body));
        }
        let receipt: VoteReceipt = resp.json().await.unwrap_or_default();
        Ok(receipt)
    }

    async fn fetch_challenge(&self) -> AgoraResult<ChallengeSpec> {
        let resp = self
            .client
            .get(self.url("/identity/challenge"))
            .send()
            .await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(AgoraError::ChallengeFailed { status, body });
        }
        resp.json()
            .await
            .map_err(|e| AgoraError::Api(format!("challenge: bad shape: {e}")))
    }

    async fn create_identity(&self, challenge: &str, nonce: &str) -> AgoraResult<IdentityGrant> {
        let body = serde_json::json!({ "challenge": challenge, "nonce": nonce });
        let resp = self
            .client
            .post(self.url("/identity/create"))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(AgoraError::IdentityCreateFailed { status, body });
        }
        resp.json()
            .await
            .map_err(|e| AgoraError::Api(format!("identity create: bad shape: {e}")))
    }

    async fn mint_stamps(&self) -> AgoraResult<MintReceipt> {
        let path = self.signed_path("/stamp");
        let signed = self.signer.sign("POST", &path, None)?;

        let req = self.client.post(self.url("/stamp"));
        let resp = Self::attach(req, &signed).send().await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(api_error("mint stamps", status, &body));
        }
        resp.json()
            .await
            .map_err(|e| AgoraError::Api(format!("mint: bad shape: {e}")))
    }

    async fn stream_results(&self, poll_id: &str) -> AgoraResult<Option<PollEventStream>> {
        let resp = self
            .client
            .get(self.url(&format!("/polls/{poll_id}/stream")))
            .send()
            .await?;
        // A valid poll may legitimately have no stream.
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(api_error("results stream", status, &body));
        }

        let bytes: Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>> = Box::pin(
            resp.bytes_stream()
                .map(|r| r.map(|b| b.to_vec()).map_err(|e| e.to_string())),
        );
        let state = SseStreamState {
            bytes,
            parser: SseParser::default(),
            pending: VecDeque::new(),
            done: false,
        };
        let stream = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((item, st));
                }
                if st.done {
                    return None;
                }
                match st.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = String::from_utf8_lossy(&chunk).into_owned();
                        for event in st.parser.feed(&text) {
                            if let Some(poll_event) = decode_poll_event(&event) {
                                st.pending.push_back(Ok(poll_event));
                            }
                        }
                    }
                    Some(Err(err)) => {
                        // One terminal error, then the stream ends. The
                        // caller resubscribes by reopening the poll view.
                        st.done = true;
                        st.pending.push_back(Err(AgoraError::Network(err)));
                    }
                    None => st.done = true,
                }
            }
        });
        Ok(Some(Box::pin(stream)))
    }
}

struct SseStreamState {
    bytes: Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>,
    parser: SseParser,
    pending: VecDeque<AgoraResult<PollEvent>>,
    done: bool,
}

/// Tolerant decode of the poll index: bare array or `{polls: [...]}`.
/// Entries that fail to decode are skipped, not fatal.
pub(crate) fn decode_poll_index(value: &serde_json::Value) -> Vec<RemotePoll> {
    let entries = value
        .as_array()
        .or_else(|| value.get("polls").and_then(|p| p.as_array()));
    let Some(entries) = entries else {
        tracing::warn!("poll index has unexpected shape");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(poll) => Some(poll),
            Err(err) => {
                tracing::warn!(%err, "skipping undecodable poll entry");
                None
            }
        })
        .collect()
}

/// One server-sent event: optional name plus data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub name: Option<String>,
    pub data: String,
}

/// Incremental parser for the text/event-stream format. Chunks may split
/// anywhere, including mid-line; events end at a blank line.
#[derive(Default)]
pub(crate) struct SseParser {
    buffer: String,
    name: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data_lines.is_empty() || self.name.is_some() {
                    events.push(SseEvent {
                        name: self.name.take(),
                        data: self.data_lines.join("\n"),
                    });
                    self.data_lines.clear();
                }
            } else if let Some(rest) = line.strip_prefix("event:") {
                self.name = Some(rest.trim_start().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data_lines.push(rest.trim_start().to_string());
            }
            // Comments (":keepalive") and id/retry fields are ignored.
        }
        events
    }
}

/// Map a named SSE event to a poll event. Undecodable payloads are
/// dropped with a warning; unknown event names are ignored.
pub(crate) fn decode_poll_event(event: &SseEvent) -> Option<PollEvent> {
    match event.name.as_deref() {
        Some("poll") => match serde_json::from_str(&event.data) {
            Ok(poll) => Some(PollEvent::Snapshot(poll)),
            Err(err) => {
                tracing::warn!(%err, "bad poll snapshot event");
                None
            }
        },
        Some("results") => match serde_json::from_str::<serde_json::Value>(&event.data) {
            Ok(value) => Some(PollEvent::Results(results::normalize(&value))),
            Err(err) => {
                tracing::warn!(%err, "bad results event");
                None
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn poll_index_accepts_both_shapes() {
        let bare = json!([{ "id": "p1", "title": "A" }]);
        let wrapped = json!({ "polls": [{ "id": "p1", "title": "A" }] });
        assert_eq!(decode_poll_index(&bare).len(), 1);
        assert_eq!(decode_poll_index(&wrapped).len(), 1);
        assert!(decode_poll_index(&json!({ "nope": 1 })).is_empty());
    }

    #[test]
    fn poll_index_skips_bad_entries() {
        let mixed = json!([{ "id": "p1", "title": "A" }, { "title": 42 }]);
        let polls = decode_poll_index(&mixed);
        assert_eq!(polls.len(), 1);
        assert_eq!(polls[0].id, "p1");
    }

    #[test]
    fn sse_parser_handles_split_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.feed("event: res").is_empty());
        assert!(parser.feed("ults\ndata: {\"a\":").is_empty());
        let events = parser.feed("1}\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                name: Some("results".into()),
                data: "{\"a\":1}".into()
            }]
        );
    }

    #[test]
    fn sse_parser_ignores_comments_and_joins_data() {
        let mut parser = SseParser::default();
        let events = parser.feed(":keepalive\nevent: poll\ndata: line1\ndata: line2\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn decode_named_events() {
        let snapshot = SseEvent {
            name: Some("poll".into()),
            data: json!({ "id": "p1", "title": "T" }).to_string(),
        };
        assert!(matches!(
            decode_poll_event(&snapshot),
            Some(PollEvent::Snapshot(_))
        ));

        let results = SseEvent {
            name: Some("results".into()),
            data: json!({ "totals": { "opt-0": 2 } }).to_string(),
        };
        match decode_poll_event(&results) {
            Some(PollEvent::Results(summary)) => {
                assert_eq!(summary.totals.get("opt-0"), Some(&2.0))
            }
            other => panic!("expected results event, got {other:?}"),
        }

        let unknown = SseEvent {
            name: Some("heartbeat".into()),
            data: String::new(),
        };
        assert!(decode_poll_event(&unknown).is_none());
    }
}
