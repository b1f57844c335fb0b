//! Error Handling
//!
//! Errors surfaced by the workspace core to its callers. Adapter-level failures
//! are `anyhow` errors contained inside `storage`; only the cases below cross the
//! store boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The host lacks a storage capability (e.g. no file picker)
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// Write access to the linked file was revoked
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A persisted document could not be decoded
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// A user-supplied document could not be imported
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Every available backend failed in one save cycle
    #[error("All storage backends failed: {}", .0.join("; "))]
    AllBackendsFailed(Vec<String>),

    /// Backend failure during a user-initiated action
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

impl WorkspaceError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedEnvironment(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}
