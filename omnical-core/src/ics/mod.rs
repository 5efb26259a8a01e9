//! iCalendar helpers.
//!
//! Only the handful of properties the engine needs are read; payloads are
//! otherwise passed through untouched.

mod generate;
mod parse;

pub use generate::generate_busy_placeholder;
pub use parse::{IcsMetadata, TimeRange, parse_metadata, parse_time_range};
