//! The note record and its identity scheme.
//!
//! A note is plain text plus two timestamps. Everything else the
//! application knows about a note (events, reminders, todos) is parsed
//! out of the content by the `tags` module on demand.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::TagDoc;

/// Represents a single note in our system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for the note
    pub id: String,
    /// Free-form note content, including any tag lines
    pub content: String,
    /// When the note was created
    #[serde(rename = "created_datetime")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(rename = "updated_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note with the given content
    pub fn new(content: String) -> Self {
        let now = Utc::now();
        // Generate a unique ID using timestamp and a slug of the content
        let id = format!("{}-{}", now.timestamp_millis(), slug(&content));

        Note {
            id,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// First human-readable line of the content, for list displays.
    pub fn summary(&self) -> String {
        TagDoc::parse(&self.content).summary()
    }
}

/// Short filesystem-safe slug derived from the note summary.
fn slug(content: &str) -> String {
    let summary = TagDoc::parse(content).summary();
    let slug: String = summary
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .take(32)
        .collect();

    if slug.is_empty() {
        "note".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_id_carries_summary_slug() {
        let note = Note::new("Buy milk tomorrow".to_string());
        assert!(note.id.ends_with("-buy-milk-tomorrow"));
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn slug_falls_back_when_content_is_all_tags() {
        let note = Note::new("meta::event::2024-01-01T00:00:00.000Z".to_string());
        assert!(note.id.ends_with("-note"));
    }

    #[test]
    fn serde_uses_wire_field_names() {
        let note = Note::new("hello".to_string());
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"created_datetime\""));
        assert!(json.contains("\"updated_datetime\""));

        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, note.id);
        assert_eq!(back.content, note.content);
    }
}
