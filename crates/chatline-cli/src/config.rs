//! Configuration file support

use chatline_api::DEFAULT_BASE_URL;
use chatline_core::{BusyPolicy, ControllerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for chatline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API root of the chat backend
    pub base_url: Option<String>,
    /// Upper bound on one streamed response, in seconds
    pub stream_timeout_secs: Option<u64>,
    /// Refuse new messages while a response is still streaming
    pub reject_while_responding: Option<bool>,
    /// Load the server transcript on startup
    pub load_history: Option<bool>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatline")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CHATLINE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`; problems are reported and yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            stream_timeout_secs: None,
            reject_while_responding: Some(false),
            load_history: Some(true),
        };

        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Backend API root, falling back to the local development server
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn load_history(&self) -> bool {
        self.load_history.unwrap_or(true)
    }

    /// Runtime knobs for the conversation controller
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            stream_timeout: self
                .stream_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            busy_policy: if self.reject_while_responding.unwrap_or(false) {
                BusyPolicy::Reject
            } else {
                BusyPolicy::Allow
            },
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# chatline configuration file
# Place at ~/.config/chatline/config.toml (Linux) or set CHATLINE_CONFIG_PATH

# API root of the chat backend
base_url = "http://localhost:5001/api"

# Give up on a response after this many seconds (unset: wait forever)
# stream_timeout_secs = 120

# Refuse new messages while the AI is still responding
reject_while_responding = false

# Load the server-side transcript on startup
load_history = true
"#
}
