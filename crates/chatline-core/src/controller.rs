//! Conversation controller: user input in, streamed responses into the store

use std::{path::Path, sync::Arc, time::Duration};

use chatline_api::{Message, UploadReceipt};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::{
    error::{Error, Result},
    events::ConversationEvent,
    gateway::{AuthGateway, HistoryGateway, UploadGateway},
    handle::ControllerHandle,
    session::{SessionReport, StreamSession},
    store::{Edit, MessageStore, Snapshot},
    transport::ChatTransport,
};

/// What to do with a send while another response is still streaming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Start another session; each fills its own placeholder
    #[default]
    Allow,
    /// Refuse the send without touching the store
    Reject,
}

/// Controller configuration
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Bound on one response, from request open to end of stream
    pub stream_timeout: Option<Duration>,
    pub busy_policy: BusyPolicy,
}

/// Result of [`ConversationController::send_message`]
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Blank input; nothing happened
    Ignored,
    /// Refused under [`BusyPolicy::Reject`]
    Busy,
    /// The session ran to a terminal state
    Finished(SessionReport),
}

impl SendOutcome {
    pub fn report(&self) -> Option<&SessionReport> {
        match self {
            SendOutcome::Finished(report) => Some(report),
            _ => None,
        }
    }
}

/// Turns user input into store mutations and stream sessions.
///
/// All state lives in the store and the handle, so every operation takes
/// `&self` and several sends may be in flight at once.
pub struct ConversationController {
    config: ControllerConfig,
    store: MessageStore,
    transport: Arc<dyn ChatTransport>,
    auth: Arc<dyn AuthGateway>,
    history: Option<Arc<dyn HistoryGateway>>,
    uploads: Option<Arc<dyn UploadGateway>>,
    event_tx: broadcast::Sender<ConversationEvent>,
    handle: ControllerHandle,
}

impl ConversationController {
    /// Create a controller with an empty transcript
    pub fn new(
        config: ControllerConfig,
        transport: Arc<dyn ChatTransport>,
        auth: Arc<dyn AuthGateway>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            store: MessageStore::new(),
            transport,
            auth,
            history: None,
            uploads: None,
            event_tx,
            handle: ControllerHandle::new(),
        }
    }

    /// Enable `load_history` and `delete_history`
    pub fn with_history(mut self, history: Arc<dyn HistoryGateway>) -> Self {
        self.history = Some(history);
        self
    }

    /// Enable `upload_file`
    pub fn with_uploads(mut self, uploads: Arc<dyn UploadGateway>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The transcript this controller writes to
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Current transcript, in order
    pub fn messages(&self) -> Vec<Message> {
        self.store.list()
    }

    /// Subscribe to transcript snapshots
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.store.watch()
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for poking the controller from external code.
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    pub fn is_responding(&self) -> bool {
        self.handle.is_responding()
    }

    pub fn is_uploading(&self) -> bool {
        self.handle.is_uploading()
    }

    /// Cancel every open session; each fails with "Request aborted"
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Start over locally: clear the transcript, then cancel open sessions.
    ///
    /// Sessions cancelled here find their placeholders gone, so their final
    /// writes are dropped.
    pub fn new_chat(&self) {
        self.store.clear();
        self.handle.abort();
        tracing::debug!("Started a new chat");
    }

    /// Send one user message and stream the reply into a fresh placeholder.
    ///
    /// The user message and the placeholder are appended before any network
    /// activity. Transport and server failures do not surface as `Err`; they
    /// end the session as Failed with the reason written into the placeholder.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring blank message");
            return Ok(SendOutcome::Ignored);
        }

        let exclusive = self.config.busy_policy == BusyPolicy::Reject;
        let Some(_responding) = self.handle.begin_session(exclusive) else {
            tracing::debug!("Rejecting message while a response is streaming");
            return Ok(SendOutcome::Busy);
        };
        let cancel = self.handle.session_token();

        let timestamp = Utc::now();
        let user = Message::user(text, timestamp);
        let placeholder = Message::placeholder(timestamp);
        let placeholder_id = placeholder.id.clone();
        self.store.append(user)?;
        self.store.append(placeholder)?;

        tracing::info!("Sending message ({} chars)", text.chars().count());
        let _ = self.event_tx.send(ConversationEvent::SessionStart {
            placeholder_id: placeholder_id.clone(),
        });

        let mut session = StreamSession::new(placeholder_id, self.store.clone())
            .with_events(self.event_tx.clone());

        let transport = Arc::clone(&self.transport);
        let token = self.auth.current_token();
        let message = text.to_string();
        let open = async move {
            let response = transport.open(&message, token.as_deref()).await?;
            response.into_body().await
        };

        session.run(open, &cancel, self.config.stream_timeout).await;
        Ok(SendOutcome::Finished(session.report()))
    }

    /// Replace the transcript with the server's copy; returns its length.
    ///
    /// On any failure, including duplicate ids in the response, the local
    /// transcript is left as it was.
    pub async fn load_history(&self) -> Result<usize> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| Error::Other("No history gateway configured".to_string()))?;
        let token = self.auth.current_token();

        let messages = history.load_history(token.as_deref()).await?;
        let count = messages.len();
        self.store.replace_all(messages)?;
        tracing::info!("Loaded {} messages from history", count);
        Ok(count)
    }

    /// Delete the server-side transcript and, on success, the local one
    pub async fn delete_history(&self) -> Result<String> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| Error::Other("No history gateway configured".to_string()))?;
        let token = self.auth.current_token();

        let notice = history.delete_history(token.as_deref()).await?;
        self.store.clear();
        tracing::info!("Deleted chat history");
        Ok(notice)
    }

    /// Upload a file, tracking progress in a system notice.
    ///
    /// The notice reads `Uploading <name>...` and becomes either
    /// `Uploaded: <server filename>` or a failed `Upload failed: <name>.`.
    pub async fn upload_file(&self, path: &Path) -> Result<UploadReceipt> {
        let uploads = self
            .uploads
            .as_ref()
            .ok_or_else(|| Error::Other("No upload gateway configured".to_string()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let notice = Message::file_notice(format!("Uploading {name}..."), Utc::now());
        let notice_id = notice.id.clone();
        self.store.append(notice)?;

        let _uploading = self.handle.begin_upload();
        let token = self.auth.current_token();
        match uploads.upload(path, token.as_deref()).await {
            Ok(receipt) => {
                tracing::info!("Uploaded {} as {}", name, receipt.filename);
                self.store.update_by_id(
                    &notice_id,
                    [Edit::Content(format!("Uploaded: {}", receipt.filename))],
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!("Upload of {} failed: {}", name, e);
                self.store.update_by_id(
                    &notice_id,
                    [
                        Edit::Content(format!("Upload failed: {name}.")),
                        Edit::Error(true),
                    ],
                );
                Err(e.into())
            }
        }
    }
}
