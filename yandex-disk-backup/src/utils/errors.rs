//! Custom error types for the backup agent.
//!
//! Every failure that crosses the agent boundary is an [`AgentError`]. Its
//! [`ErrorKind`] tells the caller whether the agent itself rejected the
//! operation or the remote disk could not be reached.

use serde::Serialize;
use thiserror::Error;

use crate::disk::DiskError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Authentication failed; reconfigure the Yandex Disk token: {0}")]
    Authentication(String),

    #[error("Insufficient storage on Yandex Disk: {0}")]
    InsufficientStorage(String),

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Cannot use backup folder {0}")]
    Folder(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Cannot connect to Yandex Disk: {0}")]
    Connection(String),

    #[error("Too many requests to Yandex Disk; retry later: {0}")]
    RateLimited(String),

    #[error("Yandex Disk operation failed: {0}")]
    Remote(String),
}

/// Host-visible classification of an [`AgentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The agent rejected the operation
    Agent,
    /// The remote disk could not serve the operation
    Unreachable,
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Authentication(_)
            | AgentError::InsufficientStorage(_)
            | AgentError::NotFound(_)
            | AgentError::Folder(_)
            | AgentError::Config(_)
            | AgentError::Cancelled => ErrorKind::Agent,
            AgentError::Connection(_) | AgentError::RateLimited(_) | AgentError::Remote(_) => {
                ErrorKind::Unreachable
            }
        }
    }

    /// Classify a remote failure for an operation on `backup_id`.
    ///
    /// Unlike the plain `From` conversion this keeps the backup id in
    /// not-found errors.
    pub fn for_backup(backup_id: &str, err: DiskError) -> Self {
        match err {
            DiskError::NotFound(_) => AgentError::NotFound(backup_id.to_string()),
            other => other.into(),
        }
    }
}

impl From<DiskError> for AgentError {
    fn from(err: DiskError) -> Self {
        match err {
            DiskError::Unauthorized(msg) => AgentError::Authentication(msg),
            DiskError::InsufficientStorage(msg) => AgentError::InsufficientStorage(msg),
            DiskError::NotFound(msg) => AgentError::NotFound(msg),
            DiskError::TooManyRequests(msg) => AgentError::RateLimited(msg),
            DiskError::Connection(msg) => AgentError::Connection(msg),
            DiskError::Cancelled => AgentError::Cancelled,
            DiskError::AlreadyExists(msg) | DiskError::Decode(msg) => AgentError::Remote(msg),
            DiskError::Api { status, message } => {
                AgentError::Remote(format!("HTTP {status}: {message}"))
            }
            DiskError::Stream(e) => AgentError::Remote(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
