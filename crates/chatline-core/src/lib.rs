//! chatline-core: streaming message lifecycle
//!
//! This crate owns the conversation transcript and the per-request stream
//! sessions that fill AI placeholders as response fragments arrive.

pub mod controller;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handle;
pub mod session;
pub mod store;
pub mod transport;

pub use controller::{BusyPolicy, ControllerConfig, ConversationController, SendOutcome};
pub use error::{Error, Result};
pub use events::ConversationEvent;
pub use gateway::{AuthGateway, HistoryGateway, StaticToken, UploadGateway};
pub use handle::ControllerHandle;
pub use session::{SessionReport, SessionState, StreamSession};
pub use store::{Edit, MessageStore, Snapshot};
pub use transport::ChatTransport;
