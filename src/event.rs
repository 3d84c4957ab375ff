//! Event records and the recurrence engine.
//!
//! An event is a note carrying the event marker plus `event_*` field lines.
//! Recurring events step forward from their original date in fixed calendar
//! increments; each occurrence is computed as the nth step from the original
//! so that month-end clamping never accumulates drift (a monthly event on the
//! 31st lands on Feb 28 and then returns to Mar 31).
//!
//! All functions here are pure date arithmetic. "Today" is always passed in
//! by the caller, never read from the system clock.
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};

use crate::{helper::parse_datetime_flexible, tags::TagDoc, Note, NoteError};

/// Upper bound on recurrence steps scanned in one call. Bails out rather
/// than looping forever on degenerate rules.
const STEP_GUARD: u32 = 100_000;

/// How an event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "yearly" => Ok(Recurrence::Yearly),
            other => Err(NoteError::InvalidFormat {
                message: format!("unknown recurrence type: {other}"),
            }),
        }
    }
}

/// An event as derived from a note's tag lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// ID of the note the event came from.
    pub id: String,
    pub description: String,
    /// Original date of the event; recurrences step forward from here.
    pub date_time: NaiveDateTime,
    pub recurrence: Recurrence,
    pub tags: Vec<String>,
    pub notes: String,
    /// Hidden events stay out of dashboards.
    pub hidden: bool,
    /// Deadline events never step; the countdown targets the original date.
    pub deadline: bool,
}

impl EventRecord {
    /// Derives an event from a note. Returns None unless the note carries
    /// the event marker and a parseable `event_date`. An unknown recurrence
    /// value degrades to non-recurring rather than failing.
    pub fn from_note(note: &Note) -> Option<EventRecord> {
        let doc = TagDoc::parse(&note.content);
        if !doc.is_event() {
            return None;
        }

        let fields = doc.fields();
        let date_time = parse_datetime_flexible(&fields.date)?;
        let recurrence = fields.recurring_type.parse().unwrap_or_default();

        Some(EventRecord {
            id: note.id.clone(),
            description: fields.description,
            date_time,
            recurrence,
            tags: fields.tags,
            notes: fields.notes,
            hidden: doc.is_hidden(),
            deadline: doc.is_deadline(),
        })
    }
}

/// One concrete date an event falls on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub event: EventRecord,
    pub is_today: bool,
    pub is_past: bool,
}

/// The nth recurrence step, counted from the original date. n = 0 is the
/// original itself.
fn nth_step(origin: NaiveDateTime, recurrence: Recurrence, n: u32) -> Option<NaiveDateTime> {
    match recurrence {
        Recurrence::None => (n == 0).then_some(origin),
        Recurrence::Daily => origin.checked_add_signed(Duration::days(i64::from(n))),
        Recurrence::Weekly => origin.checked_add_signed(Duration::days(7 * i64::from(n))),
        Recurrence::Monthly => origin.checked_add_months(Months::new(n)),
        Recurrence::Yearly => n
            .checked_mul(12)
            .and_then(|months| origin.checked_add_months(Months::new(months))),
    }
}

/// All occurrences of an event that fall inside a calendar year, in order.
pub fn occurrences_in_year(event: &EventRecord, year: i32, today: NaiveDate) -> Vec<Occurrence> {
    let mut out = Vec::new();

    if !event.recurrence.is_recurring() {
        let date = event.date_time.date();
        if date.year() == year {
            out.push(occurrence_on(event, date, today));
        }
        return out;
    }

    for n in 0..STEP_GUARD {
        let Some(stepped) = nth_step(event.date_time, event.recurrence, n) else {
            break;
        };
        let date = stepped.date();
        if date.year() > year {
            break;
        }
        if date.year() == year {
            out.push(occurrence_on(event, date, today));
        }
    }

    out
}

/// Earliest occurrence on or after today. Deadline events always answer
/// with their original date, even when it has passed. A non-recurring,
/// non-deadline event that is already past has no next occurrence.
pub fn next_occurrence(event: &EventRecord, today: NaiveDate) -> Option<NaiveDate> {
    if event.deadline {
        return Some(event.date_time.date());
    }

    if !event.recurrence.is_recurring() {
        let date = event.date_time.date();
        return (date >= today).then_some(date);
    }

    for n in 0..STEP_GUARD {
        let date = nth_step(event.date_time, event.recurrence, n)?.date();
        if date >= today {
            return Some(date);
        }
    }
    None
}

/// Latest occurrence on or before today, if the event has started yet.
pub fn last_occurrence(event: &EventRecord, today: NaiveDate) -> Option<NaiveDate> {
    if !event.recurrence.is_recurring() {
        let date = event.date_time.date();
        return (date <= today).then_some(date);
    }

    let mut last = None;
    for n in 0..STEP_GUARD {
        match nth_step(event.date_time, event.recurrence, n) {
            Some(stepped) if stepped.date() <= today => last = Some(stepped.date()),
            _ => break,
        }
    }
    last
}

fn occurrence_on(event: &EventRecord, date: NaiveDate, today: NaiveDate) -> Occurrence {
    Occurrence {
        date,
        event: event.clone(),
        is_today: date == today,
        is_past: date < today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(date_str: &str, recurrence: Recurrence) -> EventRecord {
        EventRecord {
            id: "test-event".to_string(),
            description: "Test".to_string(),
            date_time: parse_datetime_flexible(date_str).unwrap(),
            recurrence,
            tags: vec![],
            notes: String::new(),
            hidden: false,
            deadline: false,
        }
    }

    fn note_with(content: &str) -> Note {
        Note {
            id: "n1".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn recurrence_round_trips_and_rejects_unknowns() {
        for variant in ["none", "daily", "weekly", "monthly", "yearly"] {
            assert_eq!(variant.parse::<Recurrence>().unwrap().as_str(), variant);
        }
        assert_eq!("".parse::<Recurrence>().unwrap(), Recurrence::None);
        assert!("fortnightly".parse::<Recurrence>().is_err());
    }

    #[test]
    fn monthly_rent_lands_on_the_fifth_every_month() {
        let rent = event("2024-01-05T00:00", Recurrence::Monthly);
        let today = date(2024, 3, 10);

        let occurrences = occurrences_in_year(&rent, 2024, today);
        assert_eq!(occurrences.len(), 12);
        assert_eq!(occurrences[0].date, date(2024, 1, 5));
        assert_eq!(occurrences[1].date, date(2024, 2, 5));
        assert_eq!(occurrences[2].date, date(2024, 3, 5));
        assert!(occurrences[2].is_past);
        assert!(!occurrences[3].is_past);

        assert_eq!(last_occurrence(&rent, today), Some(date(2024, 3, 5)));
        assert_eq!(next_occurrence(&rent, today), Some(date(2024, 4, 5)));
    }

    #[test]
    fn month_end_clamping_does_not_drift() {
        let payday = event("2024-01-31T00:00", Recurrence::Monthly);
        let occurrences = occurrences_in_year(&payday, 2024, date(2024, 1, 1));
        let days: Vec<u32> = occurrences.iter().map(|o| o.date.day()).collect();
        // Short months clamp, then the 31st comes back.
        assert_eq!(days, vec![31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]);
    }

    #[test]
    fn yearly_leap_day_clamps_to_feb_28() {
        let leap = event("2024-02-29T00:00", Recurrence::Yearly);
        assert_eq!(
            occurrences_in_year(&leap, 2025, date(2024, 1, 1))[0].date,
            date(2025, 2, 28)
        );
        assert_eq!(
            occurrences_in_year(&leap, 2028, date(2024, 1, 1))[0].date,
            date(2028, 2, 29)
        );
    }

    #[test]
    fn weekly_covers_the_whole_year() {
        let standup = event("2024-12-30T09:00", Recurrence::Weekly);
        let occurrences = occurrences_in_year(&standup, 2025, date(2025, 6, 1));
        assert_eq!(occurrences.len(), 52);
        assert_eq!(occurrences[0].date, date(2025, 1, 6));
        assert_eq!(occurrences[51].date, date(2025, 12, 29));
    }

    #[test]
    fn occurrence_marks_today() {
        let daily = event("2024-01-01T00:00", Recurrence::Daily);
        let today = date(2024, 6, 15);
        assert_eq!(next_occurrence(&daily, today), Some(today));

        let occurrences = occurrences_in_year(&daily, 2024, today);
        let todays: Vec<_> = occurrences.iter().filter(|o| o.is_today).collect();
        assert_eq!(todays.len(), 1);
        assert_eq!(todays[0].date, today);
    }

    #[test]
    fn deadline_keeps_its_original_date() {
        let mut tax = event("2024-04-15T00:00", Recurrence::None);
        tax.deadline = true;
        assert_eq!(next_occurrence(&tax, date(2026, 1, 1)), Some(date(2024, 4, 15)));
    }

    #[test]
    fn one_off_event_occurs_only_in_its_own_year() {
        let party = event("2024-04-15T00:00", Recurrence::None);
        let today = date(2024, 1, 1);

        let own_year = occurrences_in_year(&party, 2024, today);
        assert_eq!(own_year.len(), 1);
        assert_eq!(own_year[0].date, date(2024, 4, 15));
        assert!(occurrences_in_year(&party, 2023, today).is_empty());
        assert!(occurrences_in_year(&party, 2025, today).is_empty());
    }

    #[test]
    fn finished_one_off_event_has_no_next_occurrence() {
        let party = event("2024-04-15T00:00", Recurrence::None);
        let later = date(2026, 1, 1);
        assert_eq!(next_occurrence(&party, later), None);
        assert_eq!(last_occurrence(&party, later), Some(date(2024, 4, 15)));
        assert!(occurrences_in_year(&party, 2026, later).is_empty());
    }

    #[test]
    fn future_event_has_no_last_occurrence() {
        let launch = event("2030-01-01T00:00", Recurrence::Monthly);
        assert_eq!(last_occurrence(&launch, date(2024, 1, 1)), None);
        assert!(occurrences_in_year(&launch, 2024, date(2024, 1, 1)).is_empty());
    }

    #[test]
    fn from_note_requires_marker_and_parseable_date() {
        let plain = note_with("event_description: X\nevent_date: 2024-01-01\n");
        assert!(EventRecord::from_note(&plain).is_none());

        let bad_date = note_with("event_date: someday\nmeta::event\n");
        assert!(EventRecord::from_note(&bad_date).is_none());

        let good = note_with(
            "event_description: Dentist\n\
             event_date: 2024-05-02T14:30\n\
             event_tags: health\n\
             event_recurring_type: yearly\n\
             meta::event::2024-01-01T00:00:00.000Z\n\
             meta::event_hidden\n",
        );
        let record = EventRecord::from_note(&good).unwrap();
        assert_eq!(record.description, "Dentist");
        assert_eq!(record.recurrence, Recurrence::Yearly);
        assert_eq!(record.tags, vec!["health"]);
        assert!(record.hidden);
        assert!(!record.deadline);
    }

    #[test]
    fn unknown_recurrence_degrades_to_none() {
        let odd = note_with("event_date: 2024-05-02\nevent_recurring_type: fortnightly\nmeta::event\n");
        let record = EventRecord::from_note(&odd).unwrap();
        assert_eq!(record.recurrence, Recurrence::None);
    }
}
