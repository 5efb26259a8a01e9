//! Remote calendar access.
//!
//! The engine talks to each calendar only through [`CalendarRemote`]. Two
//! implementations ship with the crate:
//! - [`ProviderRemote`] runs an external `omnical-provider-<name>` binary
//!   per call, speaking JSON over stdin/stdout (see [`protocol`])
//! - [`MemoryRemote`] keeps events in memory, with failure injection

mod memory;
pub mod protocol;
pub mod provider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{MemoryRemote, RemoteCall};
pub use provider::{Provider, ProviderRemote, RemoteConfig};

/// An event exactly as the remote returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub ics: String,
}

impl RawEvent {
    pub fn new(ics: impl Into<String>) -> Self {
        RawEvent { ics: ics.into() }
    }
}

/// Failures reported by a remote calendar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("event '{0}' not found")]
    NotFound(String),

    #[error("event '{0}' already exists")]
    AlreadyExists(String),

    #[error("rejected by remote: {0}")]
    Rejected(String),

    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

/// Access to one calendar on one remote.
#[async_trait]
pub trait CalendarRemote: Send + Sync {
    /// Human-readable name used in logs, e.g. `work:Calendar`.
    fn label(&self) -> String;

    async fn list_events(&self) -> Result<Vec<RawEvent>, TransportError>;

    /// Create an event from iCalendar text, returning its identifier.
    async fn create_event(&self, ics: &str) -> Result<String, TransportError>;

    async fn update_event(&self, uid: &str, ics: &str) -> Result<(), TransportError>;

    /// Delete an event. Fails with `NotFound` if it is already gone.
    async fn delete_event(&self, uid: &str) -> Result<(), TransportError>;
}
