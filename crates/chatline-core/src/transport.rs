//! Transport abstraction for opening chat requests

use async_trait::async_trait;
use chatline_api::{ApiClient, ChatResponse, Result};

/// Opens one streaming chat request per call
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `message`, bearing `token` if present.
    ///
    /// Resolves once the status line is known; the body is streamed later.
    async fn open(&self, message: &str, token: Option<&str>) -> Result<ChatResponse>;
}

#[async_trait]
impl ChatTransport for ApiClient {
    async fn open(&self, message: &str, token: Option<&str>) -> Result<ChatResponse> {
        self.open_chat(message, token).await
    }
}
