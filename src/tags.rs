//! Parser and serializer for the tag micro-language embedded in note content.
//!
//! Notes are plain text. Lines of the form `event_<key>:<value>` describe an
//! event's fields, and lines of the form `meta::<key>` or `meta::<key>::<value>`
//! carry markers such as recurrence acknowledgements, review cadences and todo
//! state. Everything else is ordinary text.
//!
//! The content is the wire format: other clients read and write these same
//! lines, so `TagDoc` keeps every line it does not understand byte-for-byte
//! intact, and edits are surgical. `parse` followed by `to_content` returns
//! the input unchanged.
use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

/// Prefix for event field lines, e.g. `event_description: Pay rent`.
pub const EVENT_PREFIX: &str = "event_";
/// Prefix for marker lines, e.g. `meta::event_hidden`.
pub const META_PREFIX: &str = "meta::";

const META_SEP: &str = "::";

/// Formats a timestamp the way other clients write it: RFC 3339 with
/// millisecond precision and a literal `Z` suffix.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One line of note content, as parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// `event_<key>:<value>` field line.
    Event {
        key: String,
        value: String,
        raw: String,
    },
    /// `meta::<key>` or `meta::<key>::<value>` marker line.
    Meta {
        key: String,
        value: Option<String>,
        raw: String,
    },
    /// Anything else, held verbatim.
    Text(String),
}

impl Line {
    fn raw(&self) -> &str {
        match self {
            Line::Event { raw, .. } => raw,
            Line::Meta { raw, .. } => raw,
            Line::Text(raw) => raw,
        }
    }
}

/// Typed view of the event field lines in a note.
///
/// Singular fields take the first matching line; later duplicates are inert.
/// Missing fields are empty rather than errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    pub description: String,
    pub date: String,
    pub tags: Vec<String>,
    pub notes: String,
    pub recurring_type: String,
    /// Unrecognized `event_<key>:` fields, keyed by `<key>`.
    pub custom: BTreeMap<String, String>,
}

/// A note's content, split into tag lines and plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDoc {
    lines: Vec<Line>,
    trailing_newline: bool,
}

impl TagDoc {
    /// Parses note content into lines. Never fails; lines that do not match
    /// the tag grammar are kept as plain text.
    pub fn parse(content: &str) -> Self {
        if content.is_empty() {
            return TagDoc {
                lines: Vec::new(),
                trailing_newline: false,
            };
        }

        let trailing_newline = content.ends_with('\n');
        let mut raw_lines: Vec<&str> = content.split('\n').collect();
        if trailing_newline {
            raw_lines.pop();
        }

        TagDoc {
            lines: raw_lines.into_iter().map(parse_line).collect(),
            trailing_newline,
        }
    }

    /// Serializes back to note content. Untouched documents round-trip
    /// byte-for-byte, including the presence or absence of a final newline.
    pub fn to_content(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(Line::raw)
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Collects the typed event fields from the document.
    pub fn fields(&self) -> EventFields {
        let mut description: Option<String> = None;
        let mut date: Option<String> = None;
        let mut tags: Option<Vec<String>> = None;
        let mut notes: Option<String> = None;
        let mut recurring_type: Option<String> = None;
        let mut custom = BTreeMap::new();

        for line in &self.lines {
            if let Line::Event { key, value, .. } = line {
                let value = value.trim();
                match key.as_str() {
                    "description" => {
                        description.get_or_insert_with(|| value.to_string());
                    }
                    "date" => {
                        date.get_or_insert_with(|| value.to_string());
                    }
                    "tags" => {
                        tags.get_or_insert_with(|| split_tags(value));
                    }
                    "notes" => {
                        notes.get_or_insert_with(|| value.to_string());
                    }
                    "recurring_type" => {
                        recurring_type.get_or_insert_with(|| value.to_string());
                    }
                    other => {
                        custom
                            .entry(other.to_string())
                            .or_insert_with(|| value.to_string());
                    }
                }
            }
        }

        EventFields {
            description: description.unwrap_or_default(),
            date: date.unwrap_or_default(),
            tags: tags.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
            recurring_type: recurring_type.unwrap_or_default(),
            custom,
        }
    }

    /// First value attached to a meta key, e.g. `cadence` out of
    /// `meta::cadence::24h`. Bare marker lines carry no value and are skipped.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Meta {
                key: k,
                value: Some(v),
                ..
            } if k == key => Some(v.as_str()),
            _ => None,
        })
    }

    /// All values attached to a meta key, in line order.
    pub fn meta_values(&self, key: &str) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Meta {
                    key: k,
                    value: Some(v),
                    ..
                } if k == key => Some(v.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True when any marker line with the given key exists, valued or not.
    pub fn has_meta(&self, key: &str) -> bool {
        self.lines
            .iter()
            .any(|line| matches!(line, Line::Meta { key: k, .. } if k == key))
    }

    /// True when a marker line with exactly this key and value exists.
    pub fn has_meta_value(&self, key: &str, value: &str) -> bool {
        self.lines.iter().any(|line| {
            matches!(line, Line::Meta { key: k, value: Some(v), .. } if k == key && v == value)
        })
    }

    /// First non-empty plain-text line, falling back to the event
    /// description. Used for list displays and note IDs.
    pub fn summary(&self) -> String {
        for line in &self.lines {
            if let Line::Text(raw) = line {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        self.fields().description
    }

    // ---- semantic accessors -------------------------------------------------

    /// True when the note carries the event marker.
    pub fn is_event(&self) -> bool {
        self.has_meta("event")
    }

    /// Timestamp value of the event marker, when present.
    pub fn event_marker(&self) -> Option<&str> {
        self.meta_value("event")
    }

    /// Deadline events never step forward; their countdown always targets
    /// the original date.
    pub fn is_deadline(&self) -> bool {
        self.has_meta("event_deadline")
    }

    /// Hidden events stay out of dashboards and calendars.
    pub fn is_hidden(&self) -> bool {
        self.has_meta("event_hidden")
    }

    /// Years whose occurrence has been acknowledged. Unparseable years are
    /// ignored.
    pub fn acknowledged_years(&self) -> Vec<i32> {
        self.meta_values("acknowledged")
            .into_iter()
            .filter_map(|v| v.trim().parse().ok())
            .collect()
    }

    pub fn is_acknowledged(&self, year: i32) -> bool {
        self.acknowledged_years().contains(&year)
    }

    /// Raw cadence payload, either the legacy shorthand (`24h`, `3d`) or a
    /// structured JSON object.
    pub fn cadence_value(&self) -> Option<&str> {
        self.meta_value("cadence")
    }

    /// Raw timestamp of the last review, when one has been recorded.
    pub fn last_review_value(&self) -> Option<&str> {
        self.meta_value("last_review")
    }

    /// True when the note carries the todo marker.
    pub fn is_todo(&self) -> bool {
        self.has_meta("todo")
    }

    /// Timestamp value of the todo marker, when present.
    pub fn todo_marker(&self) -> Option<&str> {
        self.meta_value("todo")
    }

    pub fn is_todo_completed(&self) -> bool {
        self.has_meta("todo_completed")
    }

    /// First priority marker in line order, one of `critical`, `high`,
    /// `medium`, `low`.
    pub fn priority(&self) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Meta { key, .. }
                if matches!(key.as_str(), "critical" | "high" | "medium" | "low") =>
            {
                Some(key.as_str())
            }
            _ => None,
        })
    }

    /// Raw value of the end-date marker, when present.
    pub fn end_date_value(&self) -> Option<&str> {
        self.meta_value("end_date")
    }

    // ---- mutators -----------------------------------------------------------

    /// Replaces the first `meta::<key>::_` line with a fresh value, dropping
    /// any later duplicates, or appends the line when the key is absent.
    pub fn upsert_meta(&mut self, key: &str, value: &str) {
        let raw = format!("{META_PREFIX}{key}{META_SEP}{value}");
        let fresh = Line::Meta {
            key: key.to_string(),
            value: Some(value.to_string()),
            raw,
        };

        match self.position_of_meta(key) {
            Some(first) => {
                self.lines[first] = fresh;
                self.remove_meta_after(key, first);
            }
            None => self.lines.push(fresh),
        }
    }

    /// Appends a bare `meta::<key>` marker unless one already exists.
    pub fn push_meta_flag(&mut self, key: &str) {
        if self.has_meta(key) {
            return;
        }
        self.lines.push(Line::Meta {
            key: key.to_string(),
            value: None,
            raw: format!("{META_PREFIX}{key}"),
        });
    }

    /// Appends a `meta::<key>::<value>` marker unless the exact pair already
    /// exists. Used for multi-valued keys such as acknowledgements.
    pub fn push_meta_value(&mut self, key: &str, value: &str) {
        if self.has_meta_value(key, value) {
            return;
        }
        self.lines.push(Line::Meta {
            key: key.to_string(),
            value: Some(value.to_string()),
            raw: format!("{META_PREFIX}{key}{META_SEP}{value}"),
        });
    }

    /// Removes every marker line with the given key.
    pub fn remove_meta(&mut self, key: &str) {
        self.lines
            .retain(|line| !matches!(line, Line::Meta { key: k, .. } if k == key));
    }

    /// Replaces the first `event_<key>:` line in place, dropping any later
    /// duplicates, or appends the field when absent.
    pub fn set_event_field(&mut self, key: &str, value: &str) {
        let fresh = Line::Event {
            key: key.to_string(),
            value: format!(" {value}"),
            raw: format!("{EVENT_PREFIX}{key}: {value}"),
        };

        let first = self
            .lines
            .iter()
            .position(|line| matches!(line, Line::Event { key: k, .. } if k == key));
        match first {
            Some(idx) => {
                self.lines[idx] = fresh;
                let mut seen = 0;
                self.lines.retain(|line| {
                    if matches!(line, Line::Event { key: k, .. } if k == key) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.lines.push(fresh),
        }
    }

    /// Adds or removes a bare marker, e.g. `event_hidden`.
    pub fn set_flag(&mut self, key: &str, on: bool) {
        if on {
            self.push_meta_flag(key);
        } else {
            self.remove_meta(key);
        }
    }

    /// Records an acknowledgement for one occurrence year. Idempotent.
    pub fn acknowledge_year(&mut self, year: i32) {
        self.push_meta_value("acknowledged", &year.to_string());
    }

    /// Stamps the review cursor, replacing any previous one.
    pub fn set_last_review(&mut self, when: &DateTime<Utc>) {
        self.upsert_meta("last_review", &format_timestamp(when));
    }

    fn position_of_meta(&self, key: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| matches!(line, Line::Meta { key: k, .. } if k == key))
    }

    fn remove_meta_after(&mut self, key: &str, keep: usize) {
        let mut idx = 0;
        self.lines.retain(|line| {
            let drop = idx > keep && matches!(line, Line::Meta { key: k, .. } if k == key);
            idx += 1;
            !drop
        });
    }
}

fn parse_line(raw: &str) -> Line {
    // Tolerate CRLF input; the raw line keeps its bytes either way.
    let line = raw.strip_suffix('\r').unwrap_or(raw);

    if let Some(rest) = line.strip_prefix(META_PREFIX) {
        let (key, value) = match rest.split_once(META_SEP) {
            Some((k, v)) => (k, Some(v.to_string())),
            None => (rest, None),
        };
        if is_key(key) {
            return Line::Meta {
                key: key.to_string(),
                value,
                raw: raw.to_string(),
            };
        }
    } else if let Some(rest) = line.strip_prefix(EVENT_PREFIX) {
        if let Some((key, value)) = rest.split_once(':') {
            if is_key(key) {
                return Line::Event {
                    key: key.to_string(),
                    value: value.to_string(),
                    raw: raw.to_string(),
                };
            }
        }
    }

    Line::Text(raw.to_string())
}

fn is_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RENT: &str = "event_description: Pay rent\n\
                        event_date: 2024-01-05T00:00\n\
                        event_tags: finance, home\n\
                        event_recurring_type: monthly\n\
                        meta::event::2024-01-01T08:30:00.000Z\n";

    #[test]
    fn parses_event_fields() {
        let doc = TagDoc::parse(RENT);
        let fields = doc.fields();
        assert_eq!(fields.description, "Pay rent");
        assert_eq!(fields.date, "2024-01-05T00:00");
        assert_eq!(fields.tags, vec!["finance", "home"]);
        assert_eq!(fields.recurring_type, "monthly");
        assert!(fields.notes.is_empty());
        assert!(doc.is_event());
        assert_eq!(doc.event_marker(), Some("2024-01-01T08:30:00.000Z"));
    }

    #[test]
    fn first_field_line_wins() {
        let doc = TagDoc::parse("event_description: First\nevent_description: Second\n");
        assert_eq!(doc.fields().description, "First");
    }

    #[test]
    fn unknown_event_fields_go_to_custom_map() {
        let doc = TagDoc::parse("event_location: Kitchen\nevent_date: 2024-05-01\n");
        let fields = doc.fields();
        assert_eq!(fields.custom.get("location").map(String::as_str), Some("Kitchen"));
        assert_eq!(fields.date, "2024-05-01");
    }

    #[test]
    fn round_trips_byte_for_byte() {
        let with_newline = "Some text\n\nevent_date: 2024-01-01\nmeta::unknown_future_tag::xyz\ntrailing text";
        assert_eq!(TagDoc::parse(with_newline).to_content(), with_newline);

        let ends_with_newline = format!("{with_newline}\n");
        assert_eq!(TagDoc::parse(&ends_with_newline).to_content(), ends_with_newline);

        assert_eq!(TagDoc::parse("").to_content(), "");
        assert_eq!(TagDoc::parse("\n").to_content(), "\n");
    }

    #[test]
    fn reparsing_emitted_content_changes_nothing() {
        let content = "Dentist\nevent_description: Checkup\nevent_date: 2024-05-01\nmeta::event::2024-01-01T00:00:00.000Z\nmeta::acknowledged::2024\n";
        let first = TagDoc::parse(content);
        let second = TagDoc::parse(&first.to_content());
        assert_eq!(second.to_content(), content);
        assert_eq!(second.fields(), first.fields());
        assert_eq!(second.acknowledged_years(), first.acknowledged_years());
    }

    #[test]
    fn malformed_tag_lines_stay_plain_text() {
        let content = "meta::\nevent_no colon here\nmeta::bad key::x\n";
        let doc = TagDoc::parse(content);
        assert_eq!(doc.to_content(), content);
        assert!(doc.fields().custom.is_empty());
        assert!(!doc.is_event());
    }

    #[test]
    fn meta_values_collects_in_order() {
        let doc = TagDoc::parse("meta::acknowledged::2025\ntext\nmeta::acknowledged::2026\n");
        assert_eq!(doc.meta_values("acknowledged"), vec!["2025", "2026"]);
        assert_eq!(doc.acknowledged_years(), vec![2025, 2026]);
        assert!(doc.is_acknowledged(2025));
        assert!(!doc.is_acknowledged(2024));
    }

    #[test]
    fn cadence_value_keeps_json_payload_intact() {
        let content = r#"meta::cadence::{"type":"weekly","days":["monday"],"time":"09:00"}"#;
        let doc = TagDoc::parse(content);
        assert_eq!(
            doc.cadence_value(),
            Some(r#"{"type":"weekly","days":["monday"],"time":"09:00"}"#)
        );
    }

    #[test]
    fn upsert_meta_replaces_in_place_and_drops_duplicates() {
        let mut doc = TagDoc::parse(
            "intro\nmeta::last_review::2024-01-01T00:00:00.000Z\nbody\nmeta::last_review::old\n",
        );
        doc.upsert_meta("last_review", "2024-06-01T09:00:00.000Z");
        assert_eq!(
            doc.to_content(),
            "intro\nmeta::last_review::2024-06-01T09:00:00.000Z\nbody\n"
        );
    }

    #[test]
    fn upsert_meta_appends_when_absent() {
        let mut doc = TagDoc::parse("just text");
        doc.upsert_meta("cadence", "24h");
        assert_eq!(doc.to_content(), "just text\nmeta::cadence::24h");
    }

    #[test]
    fn acknowledge_year_is_idempotent() {
        let mut doc = TagDoc::parse("meta::event::2024-01-01T00:00:00.000Z\n");
        doc.acknowledge_year(2026);
        doc.acknowledge_year(2026);
        assert_eq!(
            doc.to_content(),
            "meta::event::2024-01-01T00:00:00.000Z\nmeta::acknowledged::2026\n"
        );
    }

    #[test]
    fn set_last_review_writes_wire_timestamp() {
        let when = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let mut doc = TagDoc::parse("note body\n");
        doc.set_last_review(&when);
        assert_eq!(
            doc.to_content(),
            "note body\nmeta::last_review::2024-06-01T09:00:00.000Z\n"
        );
    }

    #[test]
    fn set_flag_toggles_marker_lines() {
        let mut doc = TagDoc::parse("event_description: Dentist\nmeta::event\n");
        doc.set_flag("event_hidden", true);
        assert!(doc.is_hidden());
        doc.set_flag("event_hidden", true);
        doc.set_flag("event_hidden", false);
        assert!(!doc.is_hidden());
        assert_eq!(doc.to_content(), "event_description: Dentist\nmeta::event\n");
    }

    #[test]
    fn set_event_field_updates_or_appends() {
        let mut doc = TagDoc::parse("event_description: Old\nbody\n");
        doc.set_event_field("description", "New");
        doc.set_event_field("date", "2024-09-01");
        assert_eq!(
            doc.to_content(),
            "event_description: New\nbody\nevent_date: 2024-09-01\n"
        );
    }

    #[test]
    fn priority_takes_first_marker_in_line_order() {
        let doc = TagDoc::parse("meta::todo::2024-01-01T00:00:00.000Z\nmeta::low\nmeta::critical\n");
        assert_eq!(doc.priority(), Some("low"));
    }

    #[test]
    fn summary_prefers_plain_text_over_fields() {
        let doc = TagDoc::parse("Call the bank\nevent_description: Ignored\n");
        assert_eq!(doc.summary(), "Call the bank");

        let tagged_only = TagDoc::parse("event_description: Pay rent\nmeta::event\n");
        assert_eq!(tagged_only.summary(), "Pay rent");
    }
}
