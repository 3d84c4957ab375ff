//! CLI module for the metanotes application
//!
//! This module handles the command-line interface for interacting with the
//! note storage system and the boards derived from tag lines.
use std::{
    fs::read_to_string,
    io::{stdin, stdout, Write},
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use log::info;
use shell_words::split;
use tempfile::Builder;
use tokio::sync::Mutex;

use crate::{
    countdown_board, format_day_span, format_timestamp, next_occurrence, parse_datetime_flexible,
    reminder_alerts, todo_board, year_calendar, AlertSnapshot, Commands, Config, CountdownUnit,
    EventRecord, Note, NoteError, NoteQuery, NoteStorage, ReminderRecord, Result, TagDoc,
    TodoRecord, EVENT_PREFIX, META_PREFIX,
};

/// CLI Application handler - processes CLI commands and interfaces with NoteStorage
pub struct App {
    /// The note storage backend
    note_storage: Arc<Mutex<NoteStorage>>,

    /// Application configuration
    config: Config,

    /// Path the config was loaded from, for `config --set` and `--reset`
    config_path: Option<PathBuf>,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application with the given storage backend and config
    pub fn new(
        note_storage: Arc<Mutex<NoteStorage>>,
        config: Config,
        config_path: Option<PathBuf>,
        verbose: bool,
    ) -> Self {
        Self {
            note_storage,
            config,
            config_path,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Add {
                content,
                file,
                no_edit,
            } => self.handle_add(content, file, no_edit).await?,

            Commands::View { id, json } => self.handle_view(id, json).await?,

            Commands::List {
                tag,
                date,
                limit,
                json,
            } => self.handle_list(tag, date, limit, json).await?,

            Commands::Search { query, limit, json } => {
                self.handle_search(query, limit, json).await?
            }

            Commands::Edit { id, content, file } => self.handle_edit(id, content, file).await?,

            Commands::Delete { id, force } => self.handle_delete(id, force).await?,

            Commands::Event {
                description,
                date,
                recurring,
                tags,
                notes,
                deadline,
                hidden,
            } => {
                self.handle_event(description, date, recurring, tags, notes, deadline, hidden)
                    .await?
            }

            Commands::Events { year, tag, hidden } => {
                self.handle_events(year, tag, hidden).await?
            }

            Commands::Countdown { unit } => self.handle_countdown(unit).await?,

            Commands::Reminders { json } => self.handle_reminders(json).await?,

            Commands::Review { id } => self.handle_review(id).await?,

            Commands::Ack { id, year } => self.handle_ack(id, year).await?,

            Commands::Hide { id, undo } => self.handle_hide(id, undo).await?,

            Commands::Todos { all } => self.handle_todos(all).await?,

            Commands::Alerts => self.handle_alerts().await?,

            Commands::Watch => self.handle_watch().await?,

            Commands::Config { show, set, reset } => self.handle_config(show, set, reset)?,
        }

        Ok(())
    }

    async fn handle_add(
        &self,
        content: Option<String>,
        file: Option<PathBuf>,
        no_edit: bool,
    ) -> Result<()> {
        // Get content based on the provided options
        let note_content = match (content, file) {
            (Some(c), _) => c,
            (_, Some(file_path)) => {
                if !file_path.exists() {
                    return Err(NoteError::FileNotFound {
                        file_path: file_path.display().to_string(),
                    });
                }
                read_to_string(file_path)?
            }
            (None, None) => {
                if no_edit {
                    return Err(NoteError::ApplicationError {
                        message: "No content given and the editor is disabled".to_string(),
                    });
                }
                self.open_editor_for_content("")?
            }
        };

        if note_content.trim().is_empty() {
            println!("Empty note, nothing saved.");
            return Ok(());
        }

        // Create and save the note
        let note = self.note_storage.lock().await.create_note(note_content)?;
        println!("Note created with ID: {}", note.id);
        Ok(())
    }

    async fn handle_view(&self, id: String, json: bool) -> Result<()> {
        let note = match self.note_storage.lock().await.get_note_by_id(&id) {
            Some(note) => note,
            None => return Err(NoteError::NoteNotFound { id }),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
            return Ok(());
        }

        println!("ID:      {}", note.id);
        println!("Created: {}", format_local(&note.created_at));
        if note.updated_at != note.created_at {
            println!("Updated: {}", format_local(&note.updated_at));
        }

        // Derived views, when the note's tag lines carry them
        let today = Local::now().date_naive();
        if let Some(event) = EventRecord::from_note(&note) {
            match next_occurrence(&event, today) {
                Some(next) => println!(
                    "Event:   {} ({}), next occurrence {}",
                    event.description, event.recurrence, next
                ),
                None => println!("Event:   {} ({}), no upcoming occurrence", event.description, event.recurrence),
            }
        }
        if let Some(reminder) = ReminderRecord::from_note(&note) {
            println!(
                "Review:  {}, next {}",
                reminder.cadence.describe(),
                reminder
                    .next_review
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
            );
        }
        if let Some(todo) = TodoRecord::from_note(&note) {
            let state = if todo.completed {
                "completed"
            } else if todo.is_overdue(today) {
                "overdue"
            } else {
                "open"
            };
            println!("Todo:    {}", state);
        }

        println!();
        println!("{}", note.content);
        Ok(())
    }

    /// List notes according to provided filters and options
    async fn handle_list(
        &self,
        tag: Option<String>,
        date: Option<String>,
        limit: usize,
        json: bool,
    ) -> Result<()> {
        let created_on = date
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|_| NoteError::InvalidFormat {
                    message: format!("Invalid date: {}. Expected YYYY-MM-DD", d),
                })
            })
            .transpose()?;

        let query = NoteQuery {
            text: None,
            created_on,
        };
        let mut notes = self.note_storage.lock().await.load_notes(&query)?;

        // Filter by tag pattern if one was given
        if let Some(pattern) = tag {
            let matcher = build_tag_matcher(&pattern)?;
            notes.retain(|note| {
                TagDoc::parse(&note.content)
                    .fields()
                    .tags
                    .iter()
                    .any(|t| matcher.is_match(t))
            });
        }

        apply_limit(&mut notes, limit);

        self.display_notes(&notes, json)?;
        Ok(())
    }

    async fn handle_search(&self, query: String, limit: usize, json: bool) -> Result<()> {
        let filter = NoteQuery {
            text: Some(query.clone()),
            created_on: None,
        };
        let mut results = self.note_storage.lock().await.load_notes(&filter)?;

        let truncated = limit > 0 && results.len() > limit;
        apply_limit(&mut results, limit);

        if results.is_empty() {
            println!("No notes found matching query: \"{}\"", query);
            return Ok(());
        }

        if json {
            self.display_notes_json(&results)?;
        } else {
            self.display_notes_text(&results)?;
        }

        if truncated {
            println!(
                "\nShowing {} of many matching results. Use --limit to show more.",
                results.len()
            );
        } else {
            println!("\nFound {} matching notes.", results.len());
        }

        Ok(())
    }

    async fn handle_edit(
        &self,
        id: String,
        content: Option<String>,
        file: Option<PathBuf>,
    ) -> Result<()> {
        // Validate input - check for conflicting options
        if content.is_some() && file.is_some() {
            return Err(NoteError::ApplicationError {
                message: "Cannot specify both --content and --file options".to_string(),
            });
        }

        // Retrieve the existing note
        let note = match self.note_storage.lock().await.get_note_by_id(&id) {
            Some(note) => note,
            None => return Err(NoteError::NoteNotFound { id }),
        };

        let new_content = if let Some(c) = content {
            c
        } else if let Some(file_path) = file {
            if !file_path.exists() {
                return Err(NoteError::FileNotFound {
                    file_path: file_path.display().to_string(),
                });
            }
            read_to_string(file_path)?
        } else {
            // Open the editor seeded with the current content
            self.open_editor_for_content(&note.content)?
        };

        let updated = self
            .note_storage
            .lock()
            .await
            .update_note_by_id(&id, new_content)?;
        println!("Note {} updated successfully", updated.id);
        Ok(())
    }

    async fn handle_delete(&self, id: String, force: bool) -> Result<()> {
        // Step 1: Fetch the note to be deleted (to verify it exists and show details in the prompt)
        let note = match self.note_storage.lock().await.get_note_by_id(&id) {
            Some(note) => note,
            _ => {
                return Err(NoteError::NoteNotFound { id });
            }
        };

        // Step 2: Show note details and prompt for confirmation (unless force flag is set)
        if !force {
            println!("You are about to delete the following note:");
            println!("ID:      {}", note.id);
            println!("Summary: {}", note.summary());
            println!("Created: {}", format_local(&note.created_at));

            // Show content preview (first line or two)
            if !note.content.is_empty() {
                let preview = note.content.lines().take(2).collect::<Vec<_>>().join("\n");

                println!("\nContent preview:");
                println!(
                    "{}{}",
                    preview,
                    if note.content.lines().count() > 2 {
                        "..."
                    } else {
                        ""
                    }
                );
            }

            // Ask for confirmation
            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush().map_err(NoteError::Io)?;

            // Read user input
            let mut input = String::new();
            stdin().read_line(&mut input).map_err(NoteError::Io)?;

            // Check if user confirmed
            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        // Step 3: Delete the note
        self.note_storage.lock().await.delete_note_by_id(&id)?;

        // Step 4: Provide feedback
        println!(
            "Note '{}' ({}) has been permanently deleted.",
            note.summary(),
            note.id
        );

        Ok(())
    }

    /// Compose an event note from its parts and save it
    #[allow(clippy::too_many_arguments)]
    async fn handle_event(
        &self,
        description: String,
        date: String,
        recurring: String,
        tags: Option<String>,
        notes: Option<String>,
        deadline: bool,
        hidden: bool,
    ) -> Result<()> {
        // Validate the date up front so a bad event never reaches disk
        let parsed =
            parse_datetime_flexible(&date).ok_or_else(|| NoteError::InvalidFormat {
                message: format!(
                    "Invalid event date: {}. Expected an ISO datetime or YYYY-MM-DD",
                    date
                ),
            })?;

        let content = compose_event_content(
            &description,
            &parsed,
            &recurring,
            tags.as_deref().map(str::trim).filter(|t| !t.is_empty()),
            notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            deadline,
            hidden,
            &Utc::now(),
        );

        let note = self.note_storage.lock().await.create_note(content)?;
        println!("Event created with ID: {}", note.id);

        if self.verbose {
            if let Some(event) = EventRecord::from_note(&note) {
                let today = Local::now().date_naive();
                match next_occurrence(&event, today) {
                    Some(next) => println!("Next occurrence: {}", next),
                    None => println!("No upcoming occurrence."),
                }
            }
        }
        Ok(())
    }

    /// Show every event occurrence falling in one calendar year
    async fn handle_events(
        &self,
        year: Option<i32>,
        tag: Option<String>,
        hidden: bool,
    ) -> Result<()> {
        let today = Local::now().date_naive();
        let year = year.unwrap_or_else(|| today.year());

        let notes = self
            .note_storage
            .lock()
            .await
            .load_notes(&NoteQuery::default())?;
        let mut occurrences = year_calendar(&notes, year, today, hidden);

        if let Some(pattern) = tag {
            let matcher = build_tag_matcher(&pattern)?;
            occurrences.retain(|occ| occ.event.tags.iter().any(|t| matcher.is_match(t)));
        }

        if occurrences.is_empty() {
            println!("No event occurrences in {}.", year);
            return Ok(());
        }

        println!("Events in {}:", year);
        for occ in &occurrences {
            let date = occ.date.format("%Y-%m-%d %a");
            let mut line = format!("{}  {}", date, occ.event.description);
            if occ.event.recurrence.is_recurring() {
                line.push_str(&format!(" ({})", occ.event.recurrence));
            }
            if occ.event.deadline {
                line.push_str("  [deadline]");
            }

            if occ.is_today {
                println!("{}", console::style(line).bold().green());
            } else if occ.is_past {
                println!("{}", console::style(line).dim());
            } else {
                println!("{}", line);
            }
        }
        println!(
            "\n{} occurrence{} in {}",
            occurrences.len(),
            if occurrences.len() == 1 { "" } else { "s" },
            year
        );
        Ok(())
    }

    /// Days remaining until each upcoming event
    async fn handle_countdown(&self, unit: Option<String>) -> Result<()> {
        let unit = match unit {
            Some(raw) => raw.parse::<CountdownUnit>()?,
            None => self.config.countdown_unit,
        };

        let today = Local::now().date_naive();
        let notes = self
            .note_storage
            .lock()
            .await
            .load_notes(&NoteQuery::default())?;
        let entries = countdown_board(&notes, today);

        if entries.is_empty() {
            println!("No upcoming events.");
            return Ok(());
        }

        for entry in &entries {
            let span = format_day_span(entry.days_until, unit);
            let line = if entry.days_until < 0 {
                // Only elapsed deadlines carry a negative count
                format!(
                    "{} overdue  {} ({})",
                    span, entry.event.description, entry.next
                )
            } else if entry.days_until == 0 {
                format!("today       {} ({})", entry.event.description, entry.next)
            } else {
                format!("in {}  {} ({})", span, entry.event.description, entry.next)
            };

            if entry.days_until < 0 {
                println!("{}", console::style(line).red());
            } else if entry.days_until == 0 {
                println!("{}", console::style(line).bold().green());
            } else {
                println!("{}", line);
            }
        }
        Ok(())
    }

    /// Show due and upcoming reminders
    async fn handle_reminders(&self, json: bool) -> Result<()> {
        let now = Utc::now();
        let notes = self
            .note_storage
            .lock()
            .await
            .load_notes(&NoteQuery::default())?;
        let alerts = reminder_alerts(&notes, now);

        if json {
            let body = serde_json::json!({
                "due": alerts.due.iter().map(reminder_json).collect::<Vec<_>>(),
                "upcoming": alerts.upcoming.iter().map(reminder_json).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }

        if alerts.due.is_empty() && alerts.upcoming.is_empty() {
            println!("No reminders configured.");
            return Ok(());
        }

        if !alerts.due.is_empty() {
            println!("{}", console::style("Due now:").red().bold());
            for reminder in &alerts.due {
                self.print_reminder(reminder);
            }
        }

        if !alerts.upcoming.is_empty() {
            if !alerts.due.is_empty() {
                println!();
            }
            println!("Upcoming:");
            for reminder in &alerts.upcoming {
                self.print_reminder(reminder);
            }
        }
        Ok(())
    }

    fn print_reminder(&self, reminder: &ReminderRecord) {
        println!(
            "  {}  {} (next {})",
            reminder.note.id,
            reminder.note.summary(),
            reminder
                .next_review
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        );
        if self.verbose {
            println!("      {}", reminder.cadence.describe());
        }
    }

    /// Mark a reminder as reviewed now, pushing its next review forward
    async fn handle_review(&self, id: String) -> Result<()> {
        let note = match self.note_storage.lock().await.get_note_by_id(&id) {
            Some(note) => note,
            None => return Err(NoteError::NoteNotFound { id }),
        };

        let mut doc = TagDoc::parse(&note.content);
        if doc.cadence_value().is_none() {
            return Err(NoteError::ApplicationError {
                message: format!("Note {} has no review cadence", note.id),
            });
        }

        doc.set_last_review(&Utc::now());
        let updated = self
            .note_storage
            .lock()
            .await
            .update_note_by_id(&id, doc.to_content())?;

        match ReminderRecord::from_note(&updated) {
            Some(reminder) => println!(
                "Reviewed. Next review {}",
                reminder
                    .next_review
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
            ),
            None => println!("Reviewed."),
        }
        Ok(())
    }

    /// Acknowledge an event occurrence for one year
    async fn handle_ack(&self, id: String, year: Option<i32>) -> Result<()> {
        let note = match self.note_storage.lock().await.get_note_by_id(&id) {
            Some(note) => note,
            None => return Err(NoteError::NoteNotFound { id }),
        };

        let mut doc = TagDoc::parse(&note.content);
        if !doc.is_event() {
            return Err(NoteError::ApplicationError {
                message: format!("Note {} is not an event", note.id),
            });
        }

        let year = year.unwrap_or_else(|| Local::now().year());
        doc.acknowledge_year(year);
        self.note_storage
            .lock()
            .await
            .update_note_by_id(&id, doc.to_content())?;
        println!("Acknowledged '{}' for {}", note.summary(), year);
        Ok(())
    }

    /// Hide an event from dashboards, or unhide with --undo
    async fn handle_hide(&self, id: String, undo: bool) -> Result<()> {
        let note = match self.note_storage.lock().await.get_note_by_id(&id) {
            Some(note) => note,
            None => return Err(NoteError::NoteNotFound { id }),
        };

        let mut doc = TagDoc::parse(&note.content);
        if !doc.is_event() {
            return Err(NoteError::ApplicationError {
                message: format!("Note {} is not an event", note.id),
            });
        }

        doc.set_flag("event_hidden", !undo);
        self.note_storage
            .lock()
            .await
            .update_note_by_id(&id, doc.to_content())?;
        if undo {
            println!("'{}' is visible again.", note.summary());
        } else {
            println!("'{}' is now hidden from dashboards.", note.summary());
        }
        Ok(())
    }

    /// Show open todos grouped by state
    async fn handle_todos(&self, all: bool) -> Result<()> {
        let today = Local::now().date_naive();
        let notes = self
            .note_storage
            .lock()
            .await
            .load_notes(&NoteQuery::default())?;
        let board = todo_board(&notes, today);

        if board.overdue.is_empty() && board.open.is_empty() && (!all || board.completed.is_empty())
        {
            println!("No todos found.");
            return Ok(());
        }

        if !board.overdue.is_empty() {
            println!("{}", console::style("Overdue:").red().bold());
            for todo in &board.overdue {
                println!("{}", console::style(format_todo(todo)).red());
            }
        }

        if !board.open.is_empty() {
            if !board.overdue.is_empty() {
                println!();
            }
            println!("Open:");
            for todo in &board.open {
                println!("{}", format_todo(todo));
            }
        }

        if all && !board.completed.is_empty() {
            if !board.overdue.is_empty() || !board.open.is_empty() {
                println!();
            }
            println!("Completed:");
            for todo in &board.completed {
                println!("{}", console::style(format_todo(todo)).dim());
            }
        }
        Ok(())
    }

    /// One-shot dashboard of everything that needs attention
    async fn handle_alerts(&self) -> Result<()> {
        let notes = self
            .note_storage
            .lock()
            .await
            .load_notes(&NoteQuery::default())?;
        let snapshot = AlertSnapshot::compute(&notes, &self.config, Utc::now());
        self.render_snapshot(&snapshot);
        Ok(())
    }

    /// Poll the store and print a fresh alert snapshot whenever one lands
    async fn handle_watch(&self) -> Result<()> {
        let status = self.note_storage.lock().await.refresh_status().await;
        if !status.is_running {
            return Err(NoteError::ApplicationError {
                message: "Refresh scheduler is not running".to_string(),
            });
        }

        println!(
            "Watching for alerts every {}s. Press Ctrl-C to stop.",
            status.window_secs
        );

        // Receiver first, so the snapshot triggered below is never missed
        let mut rx = self.note_storage.lock().await.subscribe_alerts().await;
        self.note_storage.lock().await.refresh_now().await?;

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        // Scheduler went away; nothing more will arrive
                        break;
                    }
                    let snapshot = rx.borrow_and_update().clone();
                    self.render_snapshot(&snapshot);
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\nStopping watch.");
                    break;
                }
            }
        }
        Ok(())
    }

    fn render_snapshot(&self, snapshot: &AlertSnapshot) {
        let stamp = snapshot
            .taken_at
            .map(|t| format_local(&t))
            .unwrap_or_else(|| "never".to_string());
        println!("--- {} ---", stamp);

        if snapshot.is_quiet() {
            println!("Nothing needs attention.");
            return;
        }

        if !snapshot.reminders.due.is_empty() {
            println!("{}", console::style("Reviews due:").red().bold());
            for reminder in &snapshot.reminders.due {
                self.print_reminder(reminder);
            }
        }

        if !snapshot.event_alerts.is_empty() {
            println!("{}", console::style("Unacknowledged events:").yellow().bold());
            for alert in &snapshot.event_alerts {
                println!(
                    "  {}  {} (ack with: ack {} --year {})",
                    alert.date, alert.description, alert.note_id, alert.year
                );
            }
        }

        if !snapshot.overdue_todos.is_empty() {
            println!("{}", console::style("Overdue todos:").red().bold());
            for todo in &snapshot.overdue_todos {
                println!("{}", console::style(format_todo(todo)).red());
            }
        }
    }

    /// Configuration management: show, set one key, or reset to defaults
    fn handle_config(&self, show: bool, set: Option<String>, reset: bool) -> Result<()> {
        let path = self.config_path.as_deref();
        let mut acted = false;

        if reset {
            Config::default().save(path)?;
            println!("Configuration reset to defaults.");
            acted = true;
        }

        if let Some(assignment) = set {
            let (key, value) =
                assignment
                    .split_once('=')
                    .ok_or_else(|| NoteError::InvalidFormat {
                        message: format!("Invalid setting: {}. Expected key=value", assignment),
                    })?;

            // Apply against the on-disk config, not the CLI-adjusted one
            let mut config = Config::load(path)?;
            config.set(key.trim(), value.trim())?;
            config.save(path)?;
            println!("Set {} = {}", key.trim(), value.trim());
            acted = true;
        }

        if show || !acted {
            // After a write, show what landed on disk rather than the
            // CLI-adjusted view
            let config = if acted {
                Config::load(path)?
            } else {
                self.config.clone()
            };
            let path_display = self
                .config_path
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("Configuration file: {}", path_display.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Ok(())
    }

    // ---- editor handling ----------------------------------------------------

    fn open_editor_for_content(&self, initial: &str) -> Result<String> {
        // Create a temporary file with .txt extension
        let temp_file = Builder::new().suffix(".txt").tempfile()?;
        let temp_path = temp_file.path().to_path_buf();

        if !initial.is_empty() {
            std::fs::write(&temp_path, initial)?;
        }

        // Get editor from config or environment
        let editor_cmd = self.config.get_editor_command();

        // Open editor
        info!("Opening editor to write note content. Save and exit when done...");
        self.launch_editor(&editor_cmd, &temp_path)?;

        // Read back whatever the user saved
        let content = read_to_string(&temp_path)?;
        Ok(content)
    }

    fn launch_editor(&self, editor_cmd: &str, file_path: &Path) -> Result<()> {
        // Convert file path to string once
        let path_str = file_path.to_string_lossy();

        // Handle shell-like command parsing
        let args = split(editor_cmd).map_err(|e| NoteError::EditorError {
            message: format!("Failed to parse editor command: {}", e),
        })?;

        if args.is_empty() {
            return Err(NoteError::EditorError {
                message: "Empty editor command".to_string(),
            });
        }

        // First word is the program name, rest are arguments
        let program = &args[0];

        // Create command
        let mut command = Command::new(program);

        // Add any arguments from the original command
        if args.len() > 1 {
            command.args(&args[1..]);
        }

        // Add the file path as the final argument
        command.arg(path_str.as_ref());

        // Execute the command
        let status = command.status()?;

        if !status.success() {
            return Err(NoteError::EditorError {
                message: "Editor exited with non-zero status".to_string(),
            });
        }

        Ok(())
    }

    // ---- note display -------------------------------------------------------

    /// Display notes in the requested format
    fn display_notes(&self, notes: &[Note], json: bool) -> Result<()> {
        if notes.is_empty() {
            println!("No notes found matching the criteria.");
            return Ok(());
        }

        if json {
            self.display_notes_json(notes)?;
        } else {
            self.display_notes_text(notes)?;
        }

        // Print count at the end
        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );

        Ok(())
    }

    /// Display notes in JSON format
    fn display_notes_json(&self, notes: &[Note]) -> Result<()> {
        // Simplified notes with just the fields list consumers need
        let simplified_notes: Vec<serde_json::Value> = notes
            .iter()
            .map(|note| {
                serde_json::json!({
                    "id": note.id,
                    "summary": note.summary(),
                    "created_at": note.created_at,
                    "updated_at": note.updated_at.to_rfc3339(),
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&simplified_notes)?);
        Ok(())
    }

    /// Display notes in text format
    fn display_notes_text(&self, notes: &[Note]) -> Result<()> {
        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            // Add separator between notes (except before the first)
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            // Format created date
            let created_at = note
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M");

            // Print ID, summary, and creation date
            println!("ID: {} | Created: {}", note.id, created_at);
            println!("{}", console::style(note.summary()).bold());

            // Print tags if any
            let tags = TagDoc::parse(&note.content).fields().tags;
            if !tags.is_empty() {
                let tags = tags
                    .iter()
                    .map(|tag| format!("#{}", tag))
                    .collect::<Vec<_>>()
                    .join(" ");

                println!("Tags: {}", console::style(tags).cyan());
            }

            // Print a body preview when there is one beyond the summary
            let preview = self.get_content_preview(note, 100);
            if !preview.is_empty() {
                println!("{}", preview);
            }
        }

        Ok(())
    }

    /// Generate a content preview for displaying brief notes
    fn get_content_preview(&self, note: &Note, max_len: usize) -> String {
        // First non-empty body line past the summary, skipping tag lines
        let line = note
            .content
            .lines()
            .skip(1)
            .map(str::trim)
            .find(|line| {
                !line.is_empty()
                    && !line.starts_with(EVENT_PREFIX)
                    && !line.starts_with(META_PREFIX)
            })
            .unwrap_or("");

        if line.chars().count() <= max_len {
            line.to_string()
        } else {
            let truncated: String = line.chars().take(max_len).collect();
            format!("{}...", truncated)
        }
    }
}

/// Truncate a listing to a limit; 0 means unlimited
fn apply_limit<T>(items: &mut Vec<T>, limit: usize) {
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
    }
}

/// Timestamps shown to the user render in the local wall clock
fn format_local(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Build the tagged content for a new event note. The marker line records
/// when the event note was created, in the wire timestamp format.
#[allow(clippy::too_many_arguments)]
fn compose_event_content(
    description: &str,
    date: &NaiveDateTime,
    recurring: &str,
    tags: Option<&str>,
    notes: Option<&str>,
    deadline: bool,
    hidden: bool,
    created: &DateTime<Utc>,
) -> String {
    let mut doc = TagDoc::parse("");
    doc.set_event_field("description", description);
    doc.set_event_field("date", &date.format("%Y-%m-%dT%H:%M:%S").to_string());
    if recurring != "none" {
        doc.set_event_field("recurring_type", recurring);
    }
    if let Some(tags) = tags {
        doc.set_event_field("tags", tags);
    }
    if let Some(notes) = notes {
        doc.set_event_field("notes", notes);
    }
    doc.push_meta_value("event", &format_timestamp(created));
    if deadline {
        doc.push_meta_flag("event_deadline");
    }
    if hidden {
        doc.push_meta_flag("event_hidden");
    }
    doc.to_content()
}

/// One todo line for board output
fn format_todo(todo: &TodoRecord) -> String {
    let mut line = String::from("  ");
    match todo.priority {
        Some(priority) => line.push_str(&format!("[{}] ", priority.as_str())),
        None => line.push_str("[-] "),
    }
    line.push_str(&todo.text);
    if let Some(end) = todo.end_date {
        line.push_str(&format!(" (due {})", end));
    }
    line.push_str(&format!("  {}", todo.id));
    line
}

fn reminder_json(reminder: &ReminderRecord) -> serde_json::Value {
    serde_json::json!({
        "id": reminder.note.id,
        "summary": reminder.note.summary(),
        "cadence": reminder.cadence.describe(),
        "last_review": reminder.last_review,
        "next_review": reminder.next_review,
    })
}

/// Compile a tag filter; glob patterns match case-insensitively
fn build_tag_matcher(pattern: &str) -> Result<GlobSet> {
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| NoteError::InvalidFormat {
            message: format!("Invalid tag pattern: {}", e),
        })?;

    let mut builder = GlobSetBuilder::new();
    builder.add(glob);
    builder.build().map_err(|e| NoteError::InvalidFormat {
        message: format!("Invalid tag pattern: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn composed_events_carry_a_timestamped_marker() {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 4, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let content = compose_event_content(
            "Pay rent",
            &date,
            "monthly",
            Some("finance"),
            None,
            false,
            false,
            &created,
        );

        assert!(content.contains("meta::event::2026-03-01T08:30:00.000Z"));
        let doc = TagDoc::parse(&content);
        assert!(doc.is_event());
        assert_eq!(doc.event_marker(), Some("2026-03-01T08:30:00.000Z"));
        assert_eq!(doc.fields().date, "2026-04-01T09:00:00");
        assert_eq!(doc.fields().recurring_type, "monthly");
    }

    #[test]
    fn zero_listing_limit_means_unlimited() {
        let mut items = vec![1, 2, 3];
        apply_limit(&mut items, 0);
        assert_eq!(items, vec![1, 2, 3]);

        apply_limit(&mut items, 2);
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn timestamps_render_in_the_local_wall_clock() {
        let instant = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let rendered = format_local(&instant);
        let parsed = NaiveDateTime::parse_from_str(&rendered, "%Y-%m-%d %H:%M:%S").unwrap();
        let restored = Local.from_local_datetime(&parsed).single().unwrap();
        assert_eq!(restored.with_timezone(&Utc), instant);
    }

    #[test]
    fn tag_matcher_is_case_insensitive_and_globs() {
        let matcher = build_tag_matcher("health*").unwrap();
        assert!(matcher.is_match("health"));
        assert!(matcher.is_match("Healthcare"));
        assert!(!matcher.is_match("finance"));
    }

    #[test]
    fn tag_matcher_rejects_broken_patterns() {
        assert!(matches!(
            build_tag_matcher("[unclosed"),
            Err(NoteError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn todo_lines_carry_priority_and_due_date() {
        let todo = TodoRecord {
            id: "t-1".to_string(),
            text: "file the report".to_string(),
            created: Utc::now(),
            completed: false,
            priority: Some(crate::Priority::High),
            end_date: NaiveDate::from_ymd_opt(2026, 9, 1),
        };
        let line = format_todo(&todo);
        assert!(line.contains("[high]"));
        assert!(line.contains("file the report"));
        assert!(line.contains("due 2026-09-01"));
        assert!(line.contains("t-1"));
    }
}
