//! Core data structures for the metanotes application.
//!
//! This module contains the shared types used throughout the application,
//! including the note query filter and the CLI command surface.
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Subcommand;

use crate::NoteError;

/// A specialized Result type for metanotes operations.
pub type Result<T> = std::result::Result<T, NoteError>;

/// Filter applied when loading notes from the store.
///
/// All fields are optional; an empty query matches every note.
#[derive(Debug, Clone, Default)]
pub struct NoteQuery {
    /// Free-text query matched fuzzily against note content.
    pub text: Option<String>,
    /// Only notes created on this calendar date (local time).
    pub created_on: Option<NaiveDate>,
}

impl NoteQuery {
    /// True when the query carries no filters at all.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.created_on.is_none()
    }
}

/// Available subcommands for the metanotes application
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    Add {
        /// Content of the note; omit to read from --file or open the editor
        content: Option<String>,

        /// Path to a file containing the note's content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Never open the editor, fail instead when no content is given
        #[clap(short, long)]
        no_edit: bool,
    },

    /// View a note by ID
    View {
        /// ID of the note to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List notes, newest first
    List {
        /// Filter by event tag (glob patterns allowed)
        #[clap(short, long)]
        tag: Option<String>,

        /// Only notes created on this date (YYYY-MM-DD)
        #[clap(short, long)]
        date: Option<String>,

        /// Limit the number of notes returned
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Search notes by content
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Replace the content of an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New content for the note; omit to edit the current content
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the new note content
        #[clap(short, long)]
        file: Option<PathBuf>,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Compose a new event note from its parts
    Event {
        /// What the event is
        #[clap(short, long)]
        description: String,

        /// Event date, ISO datetime or YYYY-MM-DD
        #[clap(short = 'D', long)]
        date: String,

        /// How the event repeats
        #[clap(short, long, value_parser = ["none", "daily", "weekly", "monthly", "yearly"], default_value = "none")]
        recurring: String,

        /// Tags to attach to the event (comma-separated)
        #[clap(short, long)]
        tags: Option<String>,

        /// Free-form notes attached to the event
        #[clap(long)]
        notes: Option<String>,

        /// Mark as a deadline; the countdown always targets the original date
        #[clap(long)]
        deadline: bool,

        /// Keep the event out of dashboards
        #[clap(long)]
        hidden: bool,
    },

    /// Show the calendar of event occurrences for a year
    Events {
        /// Year to display (defaults to the current year)
        #[clap(short, long)]
        year: Option<i32>,

        /// Filter by event tag (glob patterns allowed)
        #[clap(short, long)]
        tag: Option<String>,

        /// Include hidden events
        #[clap(long)]
        hidden: bool,
    },

    /// Days remaining until each upcoming event
    Countdown {
        /// Display unit for the remaining time
        #[clap(short, long, value_parser = ["days", "weeks", "months", "years"])]
        unit: Option<String>,
    },

    /// Show due and upcoming reminders
    Reminders {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Mark a reminder as reviewed now
    Review {
        /// ID of the reminder note
        id: String,
    },

    /// Acknowledge an event occurrence for a year
    Ack {
        /// ID of the event note
        id: String,

        /// Year to acknowledge (defaults to the current year)
        #[clap(short, long)]
        year: Option<i32>,
    },

    /// Hide an event from dashboards, or unhide with --undo
    Hide {
        /// ID of the event note
        id: String,

        /// Reverse a previous hide
        #[clap(long)]
        undo: bool,
    },

    /// Show open todos grouped by priority
    Todos {
        /// Include completed todos
        #[clap(short, long)]
        all: bool,
    },

    /// One-shot dashboard of due reminders, event alerts and overdue todos
    Alerts,

    /// Poll the store and print alerts until interrupted
    Watch,

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Update a configuration setting (key=value)
        #[clap(short, long)]
        set: Option<String>,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },
}
