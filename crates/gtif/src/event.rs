//! The forum itself: schedule, venue and the countdown to opening.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

/// Opening, in Rabat local time.
pub const EVENT_START: &str = "2025-11-11T08:30:00+01:00";

/// Close, in Rabat local time.
pub const EVENT_END: &str = "2025-11-13T14:30:00+01:00";

/// Time zone the schedule is published in.
pub const EVENT_TIME_ZONE: &str = "Africa/Casablanca";

/// Event title.
pub const EVENT_SUMMARY: &str = "Ghana Trade & Investment Forum 2025";

/// Venue.
pub const EVENT_LOCATION: &str = "Palais des Congrès, Bouregreg, Rabat, Morocco";

/// One-line description.
pub const EVENT_DESCRIPTION: &str =
    "Strengthening Ghana-Morocco Trade, Investment and Tourism Partnership.";

/// Organising institutions.
pub const ORGANISERS: [&str; 2] = ["Embassy of Ghana, Morocco", "AMCI"];

/// Highlights of one programme day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgramDay {
    /// Day heading.
    pub title: &'static str,
    /// Sessions in running order.
    pub sessions: [&'static str; 3],
}

/// Programme highlights.
pub const PROGRAM: [ProgramDay; 3] = [
    ProgramDay {
        title: "Day 1 • Tue, Nov 11",
        sessions: [
            "Opening Ceremony & Keynotes",
            "Panel: Ghana–Morocco Trade Outlook",
            "Exhibition Tour",
        ],
    },
    ProgramDay {
        title: "Day 2 • Wed, Nov 12",
        sessions: [
            "Sector Roundtables (Mining, Agri, Pharma)",
            "B2B Matchmaking",
            "Tourism Showcase",
        ],
    },
    ProgramDay {
        title: "Day 3 • Thu, Nov 13",
        sessions: [
            "Startup Pitch Arena",
            "Financing Instruments Workshop",
            "Closing & Next Steps",
        ],
    },
];

fn parse_fixed(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).expect("event timestamps are valid RFC 3339")
}

/// Opening time.
#[must_use]
pub fn event_start() -> DateTime<FixedOffset> {
    parse_fixed(EVENT_START)
}

/// Closing time.
#[must_use]
pub fn event_end() -> DateTime<FixedOffset> {
    parse_fixed(EVENT_END)
}

/// Where the event stands relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Not started yet.
    Upcoming,
    /// Running.
    Live,
    /// Over.
    Ended,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Ended => "ended",
        })
    }
}

/// Time left until opening, each unit floored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Countdown {
    /// Whole days.
    pub days: i64,
    /// Hours past the whole days.
    pub hours: i64,
    /// Minutes past the whole hours.
    pub minutes: i64,
    /// Seconds past the whole minutes.
    pub seconds: i64,
}

impl Countdown {
    /// Split a remaining duration into units. Negative input reads as zero.
    #[must_use]
    pub fn from_duration(remaining: chrono::Duration) -> Self {
        let total = remaining.num_seconds().max(0);
        Self {
            days: total / 86_400,
            hours: total / 3_600 % 24,
            minutes: total / 60 % 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02} days {:02} hours {:02} mins {:02} secs",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Status and countdown at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventClock {
    /// Where the event stands.
    pub status: EventStatus,
    /// Time to opening, zero unless upcoming.
    pub countdown: Countdown,
}

/// Where the event stands at `now`.
///
/// Live covers both the opening and the closing instant.
#[must_use]
pub fn countdown_at(now: DateTime<Utc>) -> EventClock {
    let start = event_start().with_timezone(&Utc);
    let end = event_end().with_timezone(&Utc);

    if now < start {
        EventClock {
            status: EventStatus::Upcoming,
            countdown: Countdown::from_duration(start - now),
        }
    } else if now <= end {
        EventClock {
            status: EventStatus::Live,
            countdown: Countdown::default(),
        }
    } else {
        EventClock {
            status: EventStatus::Ended,
            countdown: Countdown::default(),
        }
    }
}

/// Format a schedule time as "Tue, 11 November 2025, 08:30".
#[must_use]
pub fn format_event_time(at: DateTime<FixedOffset>) -> String {
    at.format("%a, %d %B %Y, %H:%M").to_string()
}

/// One line describing the event at `clock`.
#[must_use]
pub fn status_line(clock: &EventClock) -> String {
    match clock.status {
        EventStatus::Upcoming => format!("Event starts in {}", clock.countdown),
        EventStatus::Live => format!(
            "Live now • {} – {} ({EVENT_TIME_ZONE})",
            format_event_time(event_start()),
            format_event_time(event_end())
        ),
        EventStatus::Ended => "This event has ended. Thank you for your interest.".to_string(),
    }
}
