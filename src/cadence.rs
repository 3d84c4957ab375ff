//! Review cadences and reminder records.
//!
//! A note becomes a reminder by carrying a cadence marker. Two encodings are
//! in the wild: a legacy shorthand (`24h`, `3d`) and a structured JSON object
//! (`{"type":"weekly","days":["monday"],"time":"09:00"}`). Both parse into
//! [`Cadence`]. The due date is always `last_review + interval`, anchored on
//! the note's creation time until the first review is recorded.
//!
//! Day-of-week and time-of-day details refine how a cadence is described;
//! the due computation itself uses fixed intervals so that a reminder
//! reviewed late does not fire again immediately.
use std::fmt;

use chrono::{DateTime, Duration, Months, NaiveTime, Utc, Weekday};
use serde::Deserialize;

use crate::{
    helper::parse_utc_timestamp,
    tags::TagDoc,
    Note,
};

/// How often a note asks to be reviewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cadence {
    /// Fixed interval in hours and minutes. Covers the structured
    /// `every-x-hours` type and the legacy `<N>h` shorthand.
    EveryHours { hours: u32, minutes: u32 },
    /// Fixed interval in days, from the legacy `<N>d` shorthand.
    EveryDays { days: u32 },
    Daily { time: Option<NaiveTime> },
    Weekly {
        days: Vec<Weekday>,
        time: Option<NaiveTime>,
    },
    Monthly {
        day: Option<u32>,
        time: Option<NaiveTime>,
    },
}

/// Structured cadence payload as other clients serialize it.
#[derive(Debug, Deserialize)]
struct CadencePayload {
    #[serde(rename = "type")]
    kind: String,
    hours: Option<u32>,
    minutes: Option<u32>,
    time: Option<String>,
    day: Option<serde_json::Value>,
    days: Option<Vec<String>>,
}

impl Cadence {
    /// Parses either cadence encoding. Returns None for anything
    /// unrecognized or for a zero-length interval; a note with an
    /// unreadable cadence is not a reminder.
    pub fn parse(raw: &str) -> Option<Cadence> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            return Self::parse_structured(raw);
        }
        if let Some(hours) = raw.strip_suffix('h') {
            let hours = hours.parse().ok()?;
            if hours == 0 {
                return None;
            }
            return Some(Cadence::EveryHours { hours, minutes: 0 });
        }
        if let Some(days) = raw.strip_suffix('d') {
            let days = days.parse().ok()?;
            if days == 0 {
                return None;
            }
            return Some(Cadence::EveryDays { days });
        }
        None
    }

    fn parse_structured(raw: &str) -> Option<Cadence> {
        let payload: CadencePayload = serde_json::from_str(raw).ok()?;
        match payload.kind.as_str() {
            "every-x-hours" => {
                let hours = payload.hours.unwrap_or(0);
                let minutes = payload.minutes.unwrap_or(0);
                if hours == 0 && minutes == 0 {
                    return None;
                }
                Some(Cadence::EveryHours { hours, minutes })
            }
            "daily" => Some(Cadence::Daily {
                time: parse_time(payload.time),
            }),
            "weekly" => {
                // Other clients write either a `days` list or a single `day`
                let mut names = payload.days.unwrap_or_default();
                if names.is_empty() {
                    if let Some(serde_json::Value::String(day)) = payload.day {
                        names.push(day);
                    }
                }
                Some(Cadence::Weekly {
                    days: names.iter().filter_map(|d| d.parse().ok()).collect(),
                    time: parse_time(payload.time),
                })
            }
            "monthly" => Some(Cadence::Monthly {
                day: payload.day.and_then(|v| match v {
                    serde_json::Value::Number(n) => n.as_u64().map(|n| n as u32),
                    serde_json::Value::String(s) => s.parse().ok(),
                    _ => None,
                }),
                time: parse_time(payload.time),
            }),
            _ => None,
        }
    }

    /// When the next review falls due, given the last one.
    pub fn next_review(&self, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Cadence::EveryHours { hours, minutes } => {
                let span = i64::from(*hours) * 60 + i64::from(*minutes);
                last.checked_add_signed(Duration::minutes(span))
            }
            Cadence::EveryDays { days } => last.checked_add_signed(Duration::days(i64::from(*days))),
            Cadence::Daily { .. } => last.checked_add_signed(Duration::days(1)),
            Cadence::Weekly { .. } => last.checked_add_signed(Duration::days(7)),
            Cadence::Monthly { .. } => last.checked_add_months(Months::new(1)),
        }
    }

    /// Human-readable form for displays.
    pub fn describe(&self) -> String {
        match self {
            Cadence::EveryHours { hours, minutes: 0 } => {
                format!("every {}", plural(*hours, "hour"))
            }
            Cadence::EveryHours { hours, minutes } => format!(
                "every {} {}",
                plural(*hours, "hour"),
                plural(*minutes, "minute")
            ),
            Cadence::EveryDays { days } => format!("every {}", plural(*days, "day")),
            Cadence::Daily { time } => match time {
                Some(t) => format!("daily at {}", t.format("%H:%M")),
                None => "daily".to_string(),
            },
            Cadence::Weekly { days, time } => {
                let mut out = String::from("weekly");
                if !days.is_empty() {
                    let names: Vec<&str> = days.iter().map(|d| weekday_name(*d)).collect();
                    out.push_str(&format!(" on {}", names.join(", ")));
                }
                if let Some(t) = time {
                    out.push_str(&format!(" at {}", t.format("%H:%M")));
                }
                out
            }
            Cadence::Monthly { day, time } => {
                let mut out = String::from("monthly");
                if let Some(d) = day {
                    out.push_str(&format!(" on day {d}"));
                }
                if let Some(t) = time {
                    out.push_str(&format!(" at {}", t.format("%H:%M")));
                }
                out
            }
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// A note's reminder state, derived from its cadence and review markers.
#[derive(Debug, Clone)]
pub struct ReminderRecord {
    pub note: Note,
    pub cadence: Cadence,
    /// Last recorded review, if any.
    pub last_review: Option<DateTime<Utc>>,
    /// When the reminder falls due.
    pub next_review: DateTime<Utc>,
}

impl ReminderRecord {
    /// Derives the reminder from a note. Returns None unless the note
    /// carries a parseable cadence. The first interval is anchored on the
    /// note's creation time.
    pub fn from_note(note: &Note) -> Option<ReminderRecord> {
        let doc = TagDoc::parse(&note.content);
        let cadence = Cadence::parse(doc.cadence_value()?)?;
        let last_review = doc.last_review_value().and_then(parse_utc_timestamp);
        let anchor = last_review.unwrap_or(note.created_at);
        let next_review = cadence.next_review(anchor)?;

        Some(ReminderRecord {
            note: note.clone(),
            cadence,
            last_review,
            next_review,
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }
}

fn parse_time(value: Option<String>) -> Option<NaiveTime> {
    let value = value?;
    NaiveTime::parse_from_str(&value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M"))
        .ok()
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
