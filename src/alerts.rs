//! Dashboards computed over the whole note store.
//!
//! Everything here is a pure fold over a slice of notes; "now" and "today"
//! come from the caller. Hidden events are excluded everywhere except the
//! calendar's explicit include flag.
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::{
    cadence::ReminderRecord,
    event::{next_occurrence, occurrences_in_year, EventRecord, Occurrence},
    tags::TagDoc,
    todo::TodoRecord,
    Note,
};

/// Reminders split by due state.
#[derive(Debug, Clone, Default)]
pub struct ReminderAlerts {
    /// Due now, most overdue first.
    pub due: Vec<ReminderRecord>,
    /// Not yet due, soonest first.
    pub upcoming: Vec<ReminderRecord>,
}

/// Splits every reminder in the store by due state.
pub fn reminder_alerts(notes: &[Note], now: DateTime<Utc>) -> ReminderAlerts {
    let mut alerts = ReminderAlerts::default();
    for note in notes {
        if let Some(reminder) = ReminderRecord::from_note(note) {
            if reminder.is_due(now) {
                alerts.due.push(reminder);
            } else {
                alerts.upcoming.push(reminder);
            }
        }
    }
    alerts.due.sort_by_key(|r| r.next_review);
    alerts.upcoming.sort_by_key(|r| r.next_review);
    alerts
}

/// An event occurrence waiting to be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAlert {
    pub note_id: String,
    pub description: String,
    /// The occurrence date that triggered the alert.
    pub date: NaiveDate,
    /// Year to acknowledge to clear the alert.
    pub year: i32,
}

/// Occurrences that have happened but were never acknowledged.
///
/// Only occurrences inside the eligibility window count: on or after
/// `window_start` and not in the future. Acknowledgements are per event
/// and year, so at most one alert (the year's latest elapsed occurrence)
/// is raised per event per year. Oldest first.
pub fn event_alerts(notes: &[Note], today: NaiveDate, window_start: NaiveDate) -> Vec<EventAlert> {
    let mut alerts = Vec::new();

    for note in notes {
        let Some(event) = EventRecord::from_note(note) else {
            continue;
        };
        if event.hidden {
            continue;
        }
        let doc = TagDoc::parse(&note.content);

        for year in window_start.year()..=today.year() {
            if doc.is_acknowledged(year) {
                continue;
            }
            let latest_elapsed = occurrences_in_year(&event, year, today)
                .into_iter()
                .filter(|occ| occ.date >= window_start && occ.date <= today)
                .last();
            if let Some(occ) = latest_elapsed {
                alerts.push(EventAlert {
                    note_id: event.id.clone(),
                    description: event.description.clone(),
                    date: occ.date,
                    year,
                });
            }
        }
    }

    alerts.sort_by_key(|a| a.date);
    alerts
}

/// Every occurrence in a calendar year, across all events, in date order.
pub fn year_calendar(
    notes: &[Note],
    year: i32,
    today: NaiveDate,
    include_hidden: bool,
) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    for note in notes {
        let Some(event) = EventRecord::from_note(note) else {
            continue;
        };
        if event.hidden && !include_hidden {
            continue;
        }
        occurrences.extend(occurrences_in_year(&event, year, today));
    }
    occurrences.sort_by_key(|o| o.date);
    occurrences
}

/// One row of the countdown board.
#[derive(Debug, Clone)]
pub struct CountdownEntry {
    pub event: EventRecord,
    /// Date the countdown targets.
    pub next: NaiveDate,
    /// Signed day count; negative for an elapsed deadline.
    pub days_until: i64,
}

/// Events with a target date, nearest first. Deadlines keep their original
/// date, so an elapsed deadline shows up with negative days.
pub fn countdown_board(notes: &[Note], today: NaiveDate) -> Vec<CountdownEntry> {
    let mut entries = Vec::new();
    for note in notes {
        let Some(event) = EventRecord::from_note(note) else {
            continue;
        };
        if event.hidden {
            continue;
        }
        let Some(next) = next_occurrence(&event, today) else {
            continue;
        };
        let days_until = (next - today).num_days();
        entries.push(CountdownEntry {
            event,
            next,
            days_until,
        });
    }
    entries.sort_by_key(|e| e.days_until);
    entries
}

/// Todos grouped by state for the board display.
#[derive(Debug, Clone, Default)]
pub struct TodoBoard {
    /// Open and past their end date.
    pub overdue: Vec<TodoRecord>,
    /// Open, not yet overdue.
    pub open: Vec<TodoRecord>,
    pub completed: Vec<TodoRecord>,
}

/// Groups every todo in the store, each group ordered by priority, then
/// end date, then age.
pub fn todo_board(notes: &[Note], today: NaiveDate) -> TodoBoard {
    let mut board = TodoBoard::default();
    for note in notes {
        let Some(todo) = TodoRecord::from_note(note) else {
            continue;
        };
        if todo.completed {
            board.completed.push(todo);
        } else if todo.is_overdue(today) {
            board.overdue.push(todo);
        } else {
            board.open.push(todo);
        }
    }
    board.overdue.sort_by_key(todo_sort_key);
    board.open.sort_by_key(todo_sort_key);
    board.completed.sort_by_key(todo_sort_key);
    board
}

fn todo_sort_key(todo: &TodoRecord) -> (u8, NaiveDate, DateTime<Utc>) {
    (
        todo.priority.map_or(4, |p| p as u8),
        todo.end_date.unwrap_or(NaiveDate::MAX),
        todo.created,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note(id: &str, content: &str) -> Note {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Note {
            id: id.to_string(),
            content: content.to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn yearly_event(id: &str, date: &str) -> Note {
        note(
            id,
            &format!(
                "event_description: {id}\nevent_date: {date}\nevent_recurring_type: yearly\nmeta::event\n"
            ),
        )
    }

    #[test]
    fn reminders_split_and_order_by_next_review() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let notes = vec![
            note("a", "meta::cadence::24h\nmeta::last_review::2024-06-01T00:00:00.000Z\n"),
            note("b", "meta::cadence::24h\nmeta::last_review::2024-06-10T06:00:00.000Z\n"),
            note("c", "meta::cadence::24h\nmeta::last_review::2024-06-05T00:00:00.000Z\n"),
            note("d", "no cadence here\n"),
        ];

        let alerts = reminder_alerts(&notes, now);
        let due_ids: Vec<&str> = alerts.due.iter().map(|r| r.note.id.as_str()).collect();
        assert_eq!(due_ids, vec!["a", "c"]);
        let upcoming_ids: Vec<&str> = alerts.upcoming.iter().map(|r| r.note.id.as_str()).collect();
        assert_eq!(upcoming_ids, vec!["b"]);
    }

    #[test]
    fn event_alerts_cover_each_unacknowledged_year_in_window() {
        let today = date(2026, 8, 24);
        let window = date(2025, 4, 1);
        let notes = vec![yearly_event("birthday", "2024-05-01")];

        let alerts = event_alerts(&notes, today, window);
        assert_eq!(alerts.len(), 2);
        assert_eq!((alerts[0].year, alerts[0].date), (2025, date(2025, 5, 1)));
        assert_eq!((alerts[1].year, alerts[1].date), (2026, date(2026, 5, 1)));
    }

    #[test]
    fn acknowledging_a_year_clears_its_alert() {
        let today = date(2026, 8, 24);
        let window = date(2025, 4, 1);
        let mut event_note = yearly_event("birthday", "2024-05-01");

        let mut doc = TagDoc::parse(&event_note.content);
        doc.acknowledge_year(2025);
        event_note.content = doc.to_content();

        let alerts = event_alerts(&[event_note], today, window);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].year, 2026);
    }

    #[test]
    fn occurrences_before_the_window_never_alert() {
        let today = date(2025, 6, 1);
        let window = date(2025, 4, 1);
        // Fell on 2025-03-01, before the window opened.
        let notes = vec![yearly_event("spring", "2024-03-01")];
        assert!(event_alerts(&notes, today, window).is_empty());

        // Next year's occurrence is in the window once it elapses.
        let later = date(2026, 3, 2);
        let alerts = event_alerts(&notes, later, window);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].date, date(2026, 3, 1));
    }

    #[test]
    fn future_occurrences_do_not_alert() {
        let today = date(2026, 4, 30);
        let window = date(2025, 4, 1);
        let notes = vec![yearly_event("later", "2024-05-01")];
        let alerts = event_alerts(&notes, today, window);
        // 2025's occurrence has elapsed, 2026's has not.
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].year, 2025);
    }

    #[test]
    fn hidden_events_stay_off_dashboards() {
        let today = date(2026, 8, 24);
        let mut hidden = yearly_event("secret", "2024-05-01");
        hidden.content.push_str("meta::event_hidden\n");

        assert!(event_alerts(&[hidden.clone()], today, date(2025, 4, 1)).is_empty());
        assert!(countdown_board(&[hidden.clone()], today).is_empty());
        assert!(year_calendar(&[hidden.clone()], 2026, today, false).is_empty());
        assert_eq!(year_calendar(&[hidden], 2026, today, true).len(), 1);
    }

    #[test]
    fn countdown_board_sorts_nearest_first_with_elapsed_deadlines_on_top() {
        let today = date(2024, 6, 1);
        let deadline = note(
            "tax",
            "event_description: Tax return\nevent_date: 2024-04-15\nmeta::event\nmeta::event_deadline\n",
        );
        let notes = vec![
            yearly_event("party", "2024-07-01"),
            yearly_event("conference", "2024-06-10"),
            deadline,
        ];

        let board = countdown_board(&notes, today);
        let rows: Vec<(&str, i64)> = board
            .iter()
            .map(|e| (e.event.id.as_str(), e.days_until))
            .collect();
        assert_eq!(rows, vec![("tax", -47), ("conference", 9), ("party", 30)]);
    }

    #[test]
    fn year_calendar_is_date_ordered_across_events() {
        let today = date(2024, 6, 1);
        let notes = vec![
            yearly_event("late", "2024-09-01"),
            yearly_event("early", "2024-02-01"),
        ];
        let calendar = year_calendar(&notes, 2024, today, false);
        let ids: Vec<&str> = calendar.iter().map(|o| o.event.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert!(calendar[0].is_past);
    }

    #[test]
    fn todo_board_groups_and_orders_by_priority() {
        let today = date(2024, 7, 1);
        let notes = vec![
            note("low", "small thing\nmeta::todo\nmeta::low\n"),
            note("crit", "big thing\nmeta::todo\nmeta::critical\n"),
            note("late", "missed thing\nmeta::todo\nmeta::end_date::2024-06-01\n"),
            note("done", "done thing\nmeta::todo\nmeta::todo_completed\n"),
            note("plain", "not a todo\n"),
        ];

        let board = todo_board(&notes, today);
        let open_ids: Vec<&str> = board.open.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(open_ids, vec!["crit", "low"]);
        assert_eq!(board.overdue.len(), 1);
        assert_eq!(board.overdue[0].id, "late");
        assert_eq!(board.completed.len(), 1);
        assert_eq!(board.completed[0].id, "done");
    }
}
