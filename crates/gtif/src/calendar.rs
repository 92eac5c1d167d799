//! iCalendar export of the forum.
//!
//! Produces a single-event VCALENDAR with CRLF line endings, escaped text
//! values and lines folded at 75 octets.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use crate::error::Result;
use crate::event::{event_end, event_start, EVENT_DESCRIPTION, EVENT_LOCATION, EVENT_SUMMARY};

/// Default name of the exported file.
pub const CALENDAR_FILE_NAME: &str = "GTIF2025.ics";

/// Media type of the exported file.
pub const CALENDAR_MEDIA_TYPE: &str = "text/calendar;charset=utf-8";

const PRODUCT_ID: &str = "-//GTIF 2025//Ghana-Morocco Investment Forum//EN";
const UID_DOMAIN: &str = "rabat.mfa.gov.gh";
const MAX_LINE_OCTETS: usize = 75;

/// Render the calendar, stamped with the export time `stamp`.
#[must_use]
pub fn event_calendar(stamp: DateTime<Utc>) -> String {
    let dt_stamp = ics_timestamp(stamp);
    let lines = [
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{PRODUCT_ID}"),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:gtif-{dt_stamp}@{UID_DOMAIN}"),
        format!("DTSTAMP:{dt_stamp}"),
        format!("DTSTART:{}", ics_timestamp(event_start())),
        format!("DTEND:{}", ics_timestamp(event_end())),
        format!("SUMMARY:{}", escape_text(EVENT_SUMMARY)),
        format!("LOCATION:{}", escape_text(EVENT_LOCATION)),
        format!("DESCRIPTION:{}", escape_text(EVENT_DESCRIPTION)),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];

    let mut out = String::new();
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

/// Write the calendar to `target`.
///
/// A directory target receives a file named [`CALENDAR_FILE_NAME`].
/// Returns the path written.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_calendar(target: &Path, stamp: DateTime<Utc>) -> Result<PathBuf> {
    let path = if target.is_dir() {
        target.join(CALENDAR_FILE_NAME)
    } else {
        target.to_path_buf()
    };
    std::fs::write(&path, event_calendar(stamp))?;
    info!(path = %path.display(), "Calendar written");
    Ok(path)
}

/// UTC basic-format date-time, e.g. `20251111T073000Z`.
fn ics_timestamp<Tz: TimeZone>(at: DateTime<Tz>) -> String {
    at.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string()
}

/// Escape a TEXT property value.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Fold a content line so no physical line exceeds 75 octets.
///
/// Continuation lines start with a space, which counts toward their
/// length. Multi-byte characters are never split.
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        if width + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out
}
