use thiserror::Error;

use super::session::AuthPayload;
use crate::storage::StorageError;

/// Outcome of a login attempt. Never panics, never leaves a partial session.
pub type LoginResult = Result<AuthPayload, LoginError>;

#[derive(Error, Debug)]
pub enum LoginError {
    /// The server answered with a non-success status
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Success status but not a usable login payload
    #[error("Unexpected response from server.")]
    UnexpectedResponse,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to save session: {0}")]
    Storage(#[from] StorageError),
}

impl LoginError {
    /// Status code returned by the server, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            LoginError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
