//! Ordered, id-addressable transcript shared by the controller and the UI

use chatline_api::{Message, MessageId};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// Immutable view of the transcript at one point in time
pub type Snapshot = Arc<Vec<Message>>;

/// A single field change applied through [`MessageStore::update_by_id`].
///
/// Only content and the error flag can change once a message is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Content(String),
    Error(bool),
}

/// Ordered message collection keyed by id.
///
/// Cloning yields another handle to the same transcript. Every mutation
/// publishes a fresh snapshot to watchers while still holding the lock, so
/// observers see changes in the order they were made.
#[derive(Clone)]
pub struct MessageStore {
    messages: Arc<Mutex<Vec<Message>>>,
    snapshots: Arc<watch::Sender<Snapshot>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            snapshots: Arc::new(tx),
        }
    }

    /// Append a message at the end of the transcript
    pub fn append(&self, message: Message) -> Result<()> {
        let mut messages = self.messages.lock();
        if messages.iter().any(|m| m.id == message.id) {
            return Err(Error::DuplicateId(message.id));
        }
        messages.push(message);
        self.publish(&messages);
        Ok(())
    }

    /// Apply edits to the message with `id`.
    ///
    /// A missing id is a no-op that returns `false`; this is how writes from
    /// a stream whose placeholder was cleared away get dropped.
    pub fn update_by_id(&self, id: &MessageId, edits: impl IntoIterator<Item = Edit>) -> bool {
        let mut messages = self.messages.lock();
        let Some(message) = messages.iter_mut().find(|m| &m.id == id) else {
            tracing::debug!("Dropping update for missing message {}", id);
            return false;
        };
        for edit in edits {
            match edit {
                Edit::Content(content) => message.content = content,
                Edit::Error(error) => message.error = error,
            }
        }
        self.publish(&messages);
        true
    }

    /// Look up a single message
    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.messages.lock().iter().find(|m| &m.id == id).cloned()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.lock().iter().any(|m| &m.id == id)
    }

    /// Copy of the transcript in insertion order
    pub fn list(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// The most recently published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Remove every message
    pub fn clear(&self) {
        let mut messages = self.messages.lock();
        messages.clear();
        self.publish(&messages);
    }

    /// Swap the whole transcript, e.g. for one loaded from the server.
    ///
    /// Fails without touching the store if `replacement` repeats an id.
    pub fn replace_all(&self, replacement: Vec<Message>) -> Result<()> {
        for (i, message) in replacement.iter().enumerate() {
            if replacement[..i].iter().any(|m| m.id == message.id) {
                return Err(Error::DuplicateId(message.id.clone()));
            }
        }
        let mut messages = self.messages.lock();
        *messages = replacement;
        self.publish(&messages);
        Ok(())
    }

    /// Subscribe to snapshots; the receiver starts at the current one
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    fn publish(&self, messages: &[Message]) {
        self.snapshots.send_replace(Arc::new(messages.to_vec()));
    }
}
