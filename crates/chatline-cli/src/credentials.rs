//! Login credentials storage
//!
//! Stores tokens in ~/.config/chatline/credentials.json with restricted permissions (0o600)

use chatline_api::{LoginResponse, MessageId};
use chatline_core::AuthGateway;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Tokens and identity of the logged-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: MessageId,
    pub username: String,
}

impl From<LoginResponse> for Credentials {
    fn from(login: LoginResponse) -> Self {
        Self {
            access_token: login.access_token,
            refresh_token: login.refresh_token,
            user_id: login.user_id,
            username: login.username,
        }
    }
}

/// File-backed credential store; also the CLI's [`AuthGateway`]
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at the default location
    pub fn new() -> Self {
        Self::at(crate::config::Config::config_dir().join("credentials.json"))
    }

    /// Store at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved credentials; unreadable files count as logged out
    pub fn load(&self) -> Option<Credentials> {
        if !self.path.exists() {
            return None;
        }
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(credentials) => Some(credentials),
                Err(e) => {
                    tracing::warn!("Ignoring malformed credentials file: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read credentials file: {}", e);
                None
            }
        }
    }

    /// Save credentials, owner-readable only
    pub fn save(&self, credentials: &Credentials) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                // Set directory permissions to 0o700 on Unix
                #[cfg(unix)]
                fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
            }
        }

        let content = serde_json::to_string_pretty(credentials)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner read/write only (0o600) from creation on Unix
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path)?;

        // An existing file keeps its old mode through open()
        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))?;

        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Forget saved credentials; returns whether any existed
    pub fn remove(&self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGateway for CredentialStore {
    fn current_token(&self) -> Option<String> {
        self.load().map(|c| c.access_token)
    }
}
