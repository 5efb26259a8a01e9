//! Error types for the omnical engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::remote::TransportError;

/// Errors that can occur in omnical operations.
#[derive(Error, Debug)]
pub enum OmnicalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event '{0}' has neither LAST-MODIFIED nor DTSTAMP")]
    MissingTimestamp(String),

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("State persistence error: {0}")]
    Persistence(String),

    #[error("State file {0} is in use by another sync pass")]
    StateLocked(PathBuf),

    #[error("Provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse error classification reported in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingTimestamp,
    InvalidPayload,
    Transport,
    Persistence,
    Config,
}

impl OmnicalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OmnicalError::MissingTimestamp(_) => ErrorKind::MissingTimestamp,
            OmnicalError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            OmnicalError::Transport(_) | OmnicalError::ProviderNotInstalled(_) => {
                ErrorKind::Transport
            }
            OmnicalError::Persistence(_)
            | OmnicalError::StateLocked(_)
            | OmnicalError::Io(_)
            | OmnicalError::Serialization(_) => ErrorKind::Persistence,
            OmnicalError::Config(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::MissingTimestamp => "missing timestamp",
            ErrorKind::InvalidPayload => "invalid payload",
            ErrorKind::Transport => "transport",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Config => "config",
        };
        write!(f, "{label}")
    }
}

/// Result type alias for omnical operations.
pub type OmnicalResult<T> = Result<T, OmnicalError>;
