//! Metadata extraction using the icalendar crate's parser.

use chrono::{DateTime, TimeZone, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Property, read_calendar, unfold},
};

/// The VEVENT properties reconciliation depends on.
#[derive(Debug, Clone)]
pub struct IcsMetadata {
    pub uid: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub dtstamp: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// When an event takes place, as written in its DTSTART/DTEND/DURATION.
#[derive(Debug, Clone)]
pub struct TimeRange {
    pub start: DatePerhapsTime,
    pub end: Option<DatePerhapsTime>,
    pub duration: Option<String>,
}

/// Parse the first VEVENT's metadata. Returns None without a VEVENT or UID.
pub fn parse_metadata(content: &str) -> Option<IcsMetadata> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let last_modified = vevent.find_prop("LAST-MODIFIED").and_then(parse_timestamp);
    let dtstamp = vevent.find_prop("DTSTAMP").and_then(parse_timestamp);
    let summary = vevent.find_prop("SUMMARY").map(|p| p.val.to_string());

    Some(IcsMetadata {
        uid,
        last_modified,
        dtstamp,
        summary,
    })
}

/// Parse the first VEVENT's time range. Returns None without a DTSTART.
pub fn parse_time_range(content: &str) -> Option<TimeRange> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let start = DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?;
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok());
    let duration = vevent.find_prop("DURATION").map(|p| p.val.to_string());

    Some(TimeRange {
        start,
        end,
        duration,
    })
}

fn parse_timestamp(prop: &Property) -> Option<DateTime<Utc>> {
    DatePerhapsTime::try_from(prop).ok().and_then(to_utc)
}

/// Normalize any iCalendar date or datetime to UTC.
/// Floating times are read as UTC, dates as midnight UTC.
fn to_utc(dpt: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => Some(dt),
            CalendarDateTime::Floating(naive) => Some(naive.and_utc()),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz: chrono_tz::Tz = tzid.parse().ok()?;
                tz.from_local_datetime(&date_time)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        },
    }
}
