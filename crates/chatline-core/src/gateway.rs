//! Collaborators the controller depends on but does not implement

use std::path::Path;

use async_trait::async_trait;
use chatline_api::{ApiClient, Message, Result, UploadReceipt};

/// Supplies the bearer token for outgoing requests
pub trait AuthGateway: Send + Sync {
    /// The current access token, if the user is logged in
    fn current_token(&self) -> Option<String>;
}

/// A fixed token (or none), for one-shot use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl AuthGateway for StaticToken {
    fn current_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Server-side transcript persistence
#[async_trait]
pub trait HistoryGateway: Send + Sync {
    /// The persisted transcript, oldest first
    async fn load_history(&self, token: Option<&str>) -> Result<Vec<Message>>;

    /// Delete every persisted message; returns the server's acknowledgement
    async fn delete_history(&self, token: Option<&str>) -> Result<String>;
}

/// File upload endpoint
#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn upload(&self, path: &Path, token: Option<&str>) -> Result<UploadReceipt>;
}

#[async_trait]
impl HistoryGateway for ApiClient {
    async fn load_history(&self, token: Option<&str>) -> Result<Vec<Message>> {
        ApiClient::load_history(self, token).await
    }

    async fn delete_history(&self, token: Option<&str>) -> Result<String> {
        ApiClient::delete_history(self, token).await
    }
}

#[async_trait]
impl UploadGateway for ApiClient {
    async fn upload(&self, path: &Path, token: Option<&str>) -> Result<UploadReceipt> {
        self.upload_file(path, token).await
    }
}
