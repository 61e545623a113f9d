//! Error types for chatline-core

use chatline_api::MessageId;
use thiserror::Error;

/// Result type alias using chatline-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during conversation operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the backend wire layer
    #[error(transparent)]
    Api(#[from] chatline_api::Error),

    /// A message with this id is already in the store
    #[error("Duplicate message id: {0}")]
    DuplicateId(MessageId),

    /// A generic controller error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if the backend rejected our credentials
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Api(e) => e.is_unauthorized(),
            _ => false,
        }
    }
}
