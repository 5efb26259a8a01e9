//! Core of omnical: keeps two remote calendars reconciled.
//!
//! - [`event`]: provider-neutral event records
//! - [`state`]: what was last synchronized, per identifier
//! - [`remote`]: the calendar transport trait and its implementations
//! - [`sync`]: reconciliation, the apply engine and the mode policies
//! - [`config`]: accounts and mappings loaded from TOML

pub mod config;
pub mod error;
pub mod event;
pub mod ics;
pub mod remote;
pub mod state;
pub mod sync;

pub use error::{ErrorKind, OmnicalError, OmnicalResult};
pub use event::{EventKind, EventRecord, Side, Snapshot};
