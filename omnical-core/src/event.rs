//! Provider-neutral event records.
//!
//! The engine never looks inside an event beyond what it needs to reconcile:
//! the identifier, a modification time, and whether the event is a busy
//! placeholder. Everything else stays in the opaque iCalendar payload.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OmnicalError, OmnicalResult};
use crate::ics::parse_metadata;

/// SUMMARY value that marks an event as a busy placeholder.
///
/// Matched exactly and case-sensitively: "busy" or "Busy " are real events.
pub const BUSY_SUMMARY: &str = "Busy";

/// One of the two calendars taking part in a sync pass.
///
/// In one-way modes `A` is the source and `B` the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Real,
    BusyPlaceholder,
}

/// A calendar event as seen by the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub uid: String,
    /// LAST-MODIFIED, or DTSTAMP when the event has no LAST-MODIFIED
    pub modified: DateTime<Utc>,
    /// Raw iCalendar text, propagated verbatim
    pub payload: String,
    pub kind: EventKind,
}

impl EventRecord {
    /// Build a record from raw iCalendar text.
    ///
    /// Fails with `InvalidPayload` when there is no VEVENT with a UID, and
    /// with `MissingTimestamp` when neither LAST-MODIFIED nor DTSTAMP is usable.
    pub fn from_ics(payload: impl Into<String>) -> OmnicalResult<Self> {
        let payload = payload.into();

        let metadata = parse_metadata(&payload).ok_or_else(|| {
            OmnicalError::InvalidPayload("no VEVENT with a UID found".to_string())
        })?;

        let modified = metadata
            .last_modified
            .or(metadata.dtstamp)
            .ok_or_else(|| OmnicalError::MissingTimestamp(metadata.uid.clone()))?;

        let kind = match metadata.summary.as_deref() {
            Some(BUSY_SUMMARY) => EventKind::BusyPlaceholder,
            _ => EventKind::Real,
        };

        Ok(EventRecord {
            uid: metadata.uid,
            modified,
            payload,
            kind,
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == EventKind::BusyPlaceholder
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.uid, self.modified.to_rfc3339())
    }
}

/// The events of one side at the start of a pass, keyed by identifier.
pub type Snapshot = BTreeMap<String, EventRecord>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ics(uid: &str, summary: &str, extra: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDTSTART:20250320T150000Z\r\nDTEND:20250320T160000Z\r\n{extra}END:VEVENT\r\nEND:VCALENDAR\r\n"
        )
    }

    #[test]
    fn test_prefers_last_modified_over_dtstamp() {
        let record = EventRecord::from_ics(ics(
            "u1",
            "Meeting",
            "DTSTAMP:20250101T000000Z\r\nLAST-MODIFIED:20250102T030405Z\r\n",
        ))
        .unwrap();

        assert_eq!(record.uid, "u1");
        assert_eq!(
            record.modified,
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
        );
        assert_eq!(record.kind, EventKind::Real);
    }

    #[test]
    fn test_falls_back_to_dtstamp() {
        let record =
            EventRecord::from_ics(ics("u1", "Meeting", "DTSTAMP:20250101T000000Z\r\n")).unwrap();
        assert_eq!(
            record.modified,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_timestamp() {
        let err = EventRecord::from_ics(ics("u1", "Meeting", "")).unwrap_err();
        assert!(matches!(err, OmnicalError::MissingTimestamp(uid) if uid == "u1"));
    }

    #[test]
    fn test_no_vevent_is_invalid_payload() {
        let err = EventRecord::from_ics("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").unwrap_err();
        assert!(matches!(err, OmnicalError::InvalidPayload(_)));
    }

    #[test]
    fn test_busy_classification_is_exact() {
        let stamp = "DTSTAMP:20250101T000000Z\r\n";
        let busy = EventRecord::from_ics(ics("u1", "Busy", stamp)).unwrap();
        let lower = EventRecord::from_ics(ics("u2", "busy", stamp)).unwrap();
        let longer = EventRecord::from_ics(ics("u3", "Busy day", stamp)).unwrap();

        assert!(busy.is_placeholder());
        assert!(!lower.is_placeholder());
        assert!(!longer.is_placeholder());
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::A.opposite(), Side::B);
        assert_eq!(Side::B.opposite(), Side::A);
    }
}
