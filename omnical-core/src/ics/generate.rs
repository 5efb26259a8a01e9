//! Busy placeholder generation.

use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, EventLike};

use crate::event::BUSY_SUMMARY;
use crate::ics::TimeRange;

const PRODID: &str = "-//omnical//busy-sync//EN";

/// Generate a placeholder that blocks the given time range and nothing else.
///
/// DTSTAMP and LAST-MODIFIED are pinned to `modified` (the source event's
/// modification time), so the placeholder reads back with the same
/// modification time the engine records in sync state.
pub fn generate_busy_placeholder(uid: &str, modified: DateTime<Utc>, range: &TimeRange) -> String {
    let stamp = modified.format("%Y%m%dT%H%M%SZ").to_string();

    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(uid);
    ics_event.summary(BUSY_SUMMARY);
    ics_event.add_property("DTSTAMP", &stamp);
    ics_event.add_property("LAST-MODIFIED", &stamp);
    ics_event.starts(range.start.clone());

    if let Some(ref end) = range.end {
        ics_event.ends(end.clone());
    } else if let Some(ref duration) = range.duration {
        ics_event.add_property("DURATION", duration);
    }

    cal.push(ics_event.done());
    let cal = cal.done();

    strip_ics_bloat(&cal.to_string())
}

/// Replace the icalendar crate's PRODID and drop the default CALSCALE.
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}
