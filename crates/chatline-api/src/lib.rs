//! chatline-api: wire layer for the chatline backend
//!
//! This crate owns the message wire types, the incremental response decoder,
//! and the HTTP client for every backend endpoint (chat stream, history,
//! uploads, authentication).

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use stream::{ByteStream, ChatResponse, StreamDecoder, Utf8Decoder};
pub use types::*;
