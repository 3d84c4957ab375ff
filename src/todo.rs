//! Todo records derived from todo markers.
//!
//! A note becomes a todo by carrying the todo marker. Priority and an
//! optional end date come from further markers; completion is a bare flag.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    helper::{parse_datetime_flexible, parse_utc_timestamp},
    tags::TagDoc,
    Note, NoteError,
};

/// Todo priority. Ordering puts the most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(NoteError::InvalidFormat {
                message: format!("unknown priority: {other}"),
            }),
        }
    }
}

/// A todo as derived from a note's marker lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoRecord {
    /// ID of the note the todo came from.
    pub id: String,
    /// Summary line shown on boards.
    pub text: String,
    /// When the todo was opened; falls back to the note's creation time.
    pub created: DateTime<Utc>,
    pub completed: bool,
    pub priority: Option<Priority>,
    pub end_date: Option<NaiveDate>,
}

impl TodoRecord {
    /// Derives a todo from a note. Returns None unless the todo marker is
    /// present.
    pub fn from_note(note: &Note) -> Option<TodoRecord> {
        let doc = TagDoc::parse(&note.content);
        if !doc.is_todo() {
            return None;
        }

        let created = doc
            .todo_marker()
            .and_then(parse_utc_timestamp)
            .unwrap_or(note.created_at);
        let end_date = doc
            .end_date_value()
            .and_then(parse_datetime_flexible)
            .map(|dt| dt.date());

        Some(TodoRecord {
            id: note.id.clone(),
            text: doc.summary(),
            created,
            completed: doc.is_todo_completed(),
            priority: doc.priority().and_then(|p| p.parse().ok()),
            end_date,
        })
    }

    /// Open and past its end date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.end_date.is_some_and(|d| d < today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note_with(content: &str) -> Note {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Note {
            id: "t1".to_string(),
            content: content.to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn priority_orders_most_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::Critical, Priority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::Medium, Priority::Low]
        );
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn derives_full_todo_from_markers() {
        let note = note_with(
            "Renew passport\n\
             meta::todo::2024-04-20T10:00:00.000Z\n\
             meta::high\n\
             meta::end_date::2024-06-30\n",
        );
        let todo = TodoRecord::from_note(&note).unwrap();
        assert_eq!(todo.text, "Renew passport");
        assert_eq!(todo.priority, Some(Priority::High));
        assert_eq!(todo.end_date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert!(!todo.completed);
        assert_eq!(
            todo.created,
            Utc.with_ymd_and_hms(2024, 4, 20, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn marker_without_timestamp_falls_back_to_creation_time() {
        let note = note_with("quick thing\nmeta::todo\n");
        let todo = TodoRecord::from_note(&note).unwrap();
        assert_eq!(todo.created, note.created_at);
        assert_eq!(todo.priority, None);
        assert_eq!(todo.end_date, None);
    }

    #[test]
    fn completion_flag_is_read() {
        let note = note_with("done thing\nmeta::todo\nmeta::todo_completed\n");
        assert!(TodoRecord::from_note(&note).unwrap().completed);
    }

    #[test]
    fn overdue_needs_an_elapsed_end_date_and_open_state() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let open = TodoRecord::from_note(&note_with(
            "late\nmeta::todo\nmeta::end_date::2024-06-30\n",
        ))
        .unwrap();
        assert!(open.is_overdue(today));
        assert!(!open.is_overdue(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));

        let done = TodoRecord::from_note(&note_with(
            "late but done\nmeta::todo\nmeta::todo_completed\nmeta::end_date::2024-06-30\n",
        ))
        .unwrap();
        assert!(!done.is_overdue(today));
    }

    #[test]
    fn plain_notes_are_not_todos() {
        assert!(TodoRecord::from_note(&note_with("nothing here\n")).is_none());
    }
}
