//! HTTP client for the chat backend

use std::path::Path;

use futures::StreamExt;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    stream::ChatResponse,
    types::{
        ChatRequest, LoginRequest, LoginResponse, Message, ServerNotice, SignupRequest,
        UploadReceipt,
    },
};

/// Where the backend listens when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/api";

/// Chat backend client
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given API root, e.g. `http://host:5001/api`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Open a streaming chat request.
    ///
    /// Only connection failures are errors here; the status is returned
    /// unclassified so the caller decides how to treat it.
    pub async fn open_chat(&self, message: &str, token: Option<&str>) -> Result<ChatResponse> {
        let request = ChatRequest {
            message: message.to_string(),
        };
        let response = authorize(self.client.post(self.url("/chat/")), token)
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        tracing::debug!("Chat request opened with status {}", status);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(Error::from));

        Ok(ChatResponse {
            status,
            body: Some(Box::pin(body)),
        })
    }

    /// Fetch the persisted transcript, oldest first
    pub async fn load_history(&self, token: Option<&str>) -> Result<Vec<Message>> {
        let response = authorize(self.client.get(self.url("/chat/history")), token)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Delete every persisted message; returns the server's acknowledgement
    pub async fn delete_history(&self, token: Option<&str>) -> Result<String> {
        let response = authorize(self.client.delete(self.url("/chat/history")), token)
            .send()
            .await?;
        let notice: ServerNotice = parse_json(response).await?;
        Ok(notice.msg)
    }

    /// Upload a local file as multipart field `file`
    pub async fn upload_file(&self, path: &Path, token: Option<&str>) -> Result<UploadReceipt> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidConfig(format!("Not a file: {}", path.display())))?;
        let data = tokio::fs::read(path).await?;

        let part = reqwest::multipart::Part::bytes(data).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = authorize(self.client.post(self.url("/files/upload")), token)
            .multipart(form)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Exchange credentials for tokens
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&request)
            .send()
            .await?;
        parse_json(response).await
    }

    /// Register a new account; the user logs in separately afterwards
    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let request = SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .client
            .post(self.url("/auth/signup"))
            .json(&request)
            .send()
            .await?;
        let notice: ServerNotice = parse_json(response).await?;
        Ok(notice.msg)
    }
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::status(status.as_u16(), &text));
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}
