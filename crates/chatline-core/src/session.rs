//! One request/response cycle, bound to the placeholder it fills

use std::{future::Future, time::Duration};

use chatline_api::{ByteStream, Error as ApiError, MessageId, StreamDecoder};
use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    events::ConversationEvent,
    store::{Edit, MessageStore},
};

/// Lifecycle of a stream session: `Open` until exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Open,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Open)
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub placeholder_id: MessageId,
    pub state: SessionState,
    /// The streamed text on success, the `[Error: ...]` text on failure
    pub content: String,
}

/// Streams one response into one placeholder.
///
/// The session only ever addresses its own `placeholder_id`, so several
/// sessions can run against the same store without interfering. If the
/// placeholder disappears (new chat), writes quietly become no-ops.
pub struct StreamSession {
    placeholder_id: MessageId,
    buffer: String,
    state: SessionState,
    failure: Option<String>,
    store: MessageStore,
    events: Option<broadcast::Sender<ConversationEvent>>,
}

impl StreamSession {
    pub fn new(placeholder_id: MessageId, store: MessageStore) -> Self {
        Self {
            placeholder_id,
            buffer: String::new(),
            state: SessionState::Open,
            failure: None,
            store,
            events: None,
        }
    }

    /// Broadcast updates and the terminal transition on `events`
    pub fn with_events(mut self, events: broadcast::Sender<ConversationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn placeholder_id(&self) -> &MessageId {
        &self.placeholder_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Text accumulated so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Failure reason, once the session has failed
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Append a fragment and write the whole buffer into the placeholder.
    ///
    /// Full-content replacement keeps every observed state a prefix of the
    /// final text. Returns `false` once the session is terminal.
    pub fn apply_fragment(&mut self, fragment: &str) -> bool {
        if self.state.is_terminal() {
            tracing::debug!(
                "Ignoring fragment for finished session {}",
                self.placeholder_id
            );
            return false;
        }

        self.buffer.push_str(fragment);
        self.store
            .update_by_id(&self.placeholder_id, [Edit::Content(self.buffer.clone())]);
        self.emit(ConversationEvent::SessionUpdate {
            placeholder_id: self.placeholder_id.clone(),
            delta: fragment.to_string(),
            content: self.buffer.clone(),
        });
        true
    }

    /// End of stream: `Open -> Completed`
    pub fn complete(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        self.state = SessionState::Completed;
        self.store
            .update_by_id(&self.placeholder_id, [Edit::Content(self.buffer.clone())]);
        tracing::debug!(
            "Session {} completed ({} bytes)",
            self.placeholder_id,
            self.buffer.len()
        );
        self.emit(ConversationEvent::SessionEnd {
            placeholder_id: self.placeholder_id.clone(),
            state: self.state,
            content: self.buffer.clone(),
        });
        true
    }

    /// Any failure: `Open -> Failed`, replacing partial text with the reason
    pub fn fail(&mut self, reason: &str) -> bool {
        if self.state.is_terminal() {
            return false;
        }

        self.state = SessionState::Failed;
        self.failure = Some(reason.to_string());
        let content = error_content(reason);
        self.store.update_by_id(
            &self.placeholder_id,
            [Edit::Content(content.clone()), Edit::Error(true)],
        );
        tracing::warn!("Session {} failed: {}", self.placeholder_id, reason);
        self.emit(ConversationEvent::SessionEnd {
            placeholder_id: self.placeholder_id.clone(),
            state: self.state,
            content,
        });
        true
    }

    /// Drive the session to a terminal state.
    ///
    /// `open` resolves to the accepted response body. Cancellation of
    /// `cancel` and expiry of `timeout` (measured from now, covering both the
    /// open and every read) fail the session.
    pub async fn run<F>(
        &mut self,
        open: F,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> SessionState
    where
        F: Future<Output = chatline_api::Result<ByteStream>>,
    {
        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        match self.pump(open, cancel, deadline).await {
            Ok(()) => self.complete(),
            Err(e) => self.fail(&e.reason()),
        };
        self.state
    }

    async fn pump<F>(
        &mut self,
        open: F,
        cancel: &CancellationToken,
        deadline: Option<(Instant, Duration)>,
    ) -> chatline_api::Result<()>
    where
        F: Future<Output = chatline_api::Result<ByteStream>>,
    {
        let body = bounded(open, cancel, deadline).await?;
        let mut decoder = StreamDecoder::open(body);
        while let Some(fragment) = bounded(decoder.next(), cancel, deadline).await? {
            self.apply_fragment(&fragment);
        }
        Ok(())
    }

    /// Summary of the session as it stands
    pub fn report(&self) -> SessionReport {
        let content = match &self.failure {
            Some(reason) => error_content(reason),
            None => self.buffer.clone(),
        };
        SessionReport {
            placeholder_id: self.placeholder_id.clone(),
            state: self.state,
            content,
        }
    }

    fn emit(&self, event: ConversationEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// A session dropped while still streaming (its caller went away) ends as
/// aborted rather than leaving a truncated reply that looks finished.
impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            self.fail(&ApiError::Aborted.reason());
        }
    }
}

fn error_content(reason: &str) -> String {
    format!("[Error: {reason}]")
}

/// Race `work` against cancellation and the deadline
async fn bounded<T>(
    work: impl Future<Output = chatline_api::Result<T>>,
    cancel: &CancellationToken,
    deadline: Option<(Instant, Duration)>,
) -> chatline_api::Result<T> {
    let expiry = async {
        match deadline {
            Some((at, _)) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Aborted),
        _ = expiry => Err(ApiError::Timeout(
            deadline.map(|(_, limit)| limit).unwrap_or_default(),
        )),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chatline_api::Message;
    use chrono::Utc;

    fn body(chunks: &[&'static str]) -> ByteStream {
        let items: Vec<chatline_api::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        Box::pin(tokio_stream::iter(items))
    }

    fn setup() -> (MessageStore, StreamSession) {
        let store = MessageStore::new();
        let placeholder = Message::placeholder(Utc::now());
        let session = StreamSession::new(placeholder.id.clone(), store.clone());
        store.append(placeholder).unwrap();
        (store, session)
    }

    fn placeholder(store: &MessageStore, session: &StreamSession) -> Message {
        store.get(session.placeholder_id()).unwrap()
    }

    #[test]
    fn test_fragments_then_complete() {
        let (store, mut session) = setup();
        assert!(session.apply_fragment("Hi"));
        assert_eq!(placeholder(&store, &session).content, "Hi");
        assert!(session.apply_fragment(" there"));
        assert!(session.complete());

        let msg = placeholder(&store, &session);
        assert_eq!(msg.content, "Hi there");
        assert!(!msg.error);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_fail_replaces_partial_text() {
        let (store, mut session) = setup();
        session.apply_fragment("Hel");
        assert!(session.fail("connection reset"));

        let msg = placeholder(&store, &session);
        assert_eq!(msg.content, "[Error: connection reset]");
        assert!(msg.error);
        assert_eq!(session.failure(), Some("connection reset"));
        assert_eq!(session.report().content, "[Error: connection reset]");
    }

    #[test]
    fn test_terminal_state_is_final() {
        let (store, mut session) = setup();
        session.apply_fragment("done");
        session.complete();

        assert!(!session.apply_fragment(" more"));
        assert!(!session.fail("late"));
        assert!(!session.complete());

        let msg = placeholder(&store, &session);
        assert_eq!(msg.content, "done");
        assert!(!msg.error);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_missing_placeholder_is_not_an_error() {
        let (store, mut session) = setup();
        store.clear();
        assert!(session.apply_fragment("Hi"));
        assert!(session.complete());
        assert!(store.is_empty());
        assert_eq!(session.report().content, "Hi");
    }

    #[test]
    fn test_dropped_open_session_fails() {
        let (store, mut session) = setup();
        let id = session.placeholder_id().clone();
        session.apply_fragment("Hal");
        drop(session);

        let msg = store.get(&id).unwrap();
        assert_eq!(msg.content, "[Error: Request aborted]");
        assert!(msg.error);
    }

    #[test]
    fn test_dropped_finished_session_is_untouched() {
        let (store, mut session) = setup();
        let id = session.placeholder_id().clone();
        session.apply_fragment("done");
        session.complete();
        drop(session);

        let msg = store.get(&id).unwrap();
        assert_eq!(msg.content, "done");
        assert!(!msg.error);
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let (store, mut session) = setup();
        let cancel = CancellationToken::new();
        let state = session
            .run(async { Ok(body(&["Hi", " there"])) }, &cancel, None)
            .await;
        assert_eq!(state, SessionState::Completed);
        assert_eq!(placeholder(&store, &session).content, "Hi there");
    }

    #[tokio::test]
    async fn test_run_open_failure() {
        let (store, mut session) = setup();
        let cancel = CancellationToken::new();
        let state = session
            .run(
                async { Err(ApiError::status(500, "")) },
                &cancel,
                None,
            )
            .await;
        assert_eq!(state, SessionState::Failed);
        let msg = placeholder(&store, &session);
        assert_eq!(msg.content, "[Error: Internal Server Error]");
        assert!(msg.error);
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let (store, mut session) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = session
            .run(async { Ok(body(&["never"])) }, &cancel, None)
            .await;
        assert_eq!(state, SessionState::Failed);
        assert_eq!(
            placeholder(&store, &session).content,
            "[Error: Request aborted]"
        );
    }

    #[tokio::test]
    async fn test_run_times_out_on_silent_body() {
        let (store, mut session) = setup();
        let cancel = CancellationToken::new();
        let silent: ByteStream = Box::pin(futures::stream::pending());
        let state = session
            .run(
                async { Ok(silent) },
                &cancel,
                Some(Duration::from_millis(20)),
            )
            .await;
        assert_eq!(state, SessionState::Failed);
        assert_eq!(
            placeholder(&store, &session).content,
            "[Error: Timed out after 20ms]"
        );
    }

    #[tokio::test]
    async fn test_events_follow_fragments() {
        let (tx, mut rx) = broadcast::channel(16);
        let (_store, session) = setup();
        let mut session = session.with_events(tx);
        let cancel = CancellationToken::new();
        session
            .run(async { Ok(body(&["a", "b"])) }, &cancel, None)
            .await;

        let mut contents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                ConversationEvent::SessionUpdate { content, .. } => contents.push(content),
                ConversationEvent::SessionEnd { state, content, .. } => {
                    assert_eq!(state, SessionState::Completed);
                    assert_eq!(content, "ab");
                }
                ConversationEvent::SessionStart { .. } => unreachable!(),
            }
        }
        assert_eq!(contents, vec!["a", "ab"]);
    }
}
