//! Session error type and its mapping onto the failure taxonomy

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Broad failure classes. Only a failed bind escalates past one session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Usage,
    ProtocolReject,
    Transport,
    Storage,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("short read: expected {expected} bytes, stream closed after {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("transport: {0}")]
    Transport(#[from] io::Error),

    #[error("storage {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(Duration, &'static str),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("rejected path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid request: {0}")]
    Usage(String),
}

impl SessionError {
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SessionError::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::ShortRead { .. }
            | SessionError::Transport(_)
            | SessionError::Timeout(..)
            | SessionError::Protocol(_) => FailureKind::Transport,
            SessionError::Storage { .. } => FailureKind::Storage,
            SessionError::InvalidPath { .. } => FailureKind::ProtocolReject,
            SessionError::Usage(_) => FailureKind::Usage,
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
