use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, error, trace};
use notify::EventKind;

use crate::{Note, NoteError, Result};

/// Handles file system events by updating the notes cache
pub async fn handle_fs_event(
    event: notify::Event,
    notes_cache: &Arc<Mutex<HashMap<String, Note>>>,
) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in event.paths {
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(file_stem) = path.file_stem() {
                        let note_id = file_stem.to_string_lossy().to_string();

                        // Load the note from file
                        match load_note_from_file(&path) {
                            Ok(note) => {
                                // Update cache
                                if let Ok(mut cache) = notes_cache.lock() {
                                    cache.insert(note_id.clone(), note.clone());
                                    debug!("Updated cache for note: {}", note_id);
                                }
                            }
                            Err(e) => {
                                error!(
                                    "Failed to load note from changed file {}: {}",
                                    path.display(),
                                    e
                                );
                            }
                        }
                    }
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(file_stem) = path.file_stem() {
                        let note_id = file_stem.to_string_lossy().to_string();

                        // Remove from cache
                        if let Ok(mut cache) = notes_cache.lock() {
                            if cache.remove(&note_id).is_some() {
                                debug!("Removed note {} from cache due to file deletion", note_id);
                            }
                        }
                    }
                }
            }
        }
        _ => {
            // Ignore other events
        }
    }
}

/// Helper method to load a single note from file
pub fn load_note_from_file(path: &Path) -> Result<Note> {
    debug!("Loading note from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open note file {}: {}", path.display(), e);
        NoteError::Io(e)
    })?;

    let note: Note = serde_json::from_str(&content)?;

    // Validate note
    if note.id.is_empty() {
        let error_mgs = format!("Note from {} has an empty ID", path.display());
        error!("{}", error_mgs);
        return Err(NoteError::InvalidFormat { message: error_mgs });
    }

    trace!("Successfully loaded note: {}", note.id);
    Ok(note)
}

/// Parses a date or datetime string the way other note clients accept them.
///
/// Tries RFC 3339 first, then the naive `YYYY-MM-DDTHH:MM[:SS[.fff]]` forms,
/// then a bare `YYYY-MM-DD` (taken as midnight). Returns None rather than an
/// error; callers treat unparseable dates as absent.
pub fn parse_datetime_flexible(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }

    None
}

/// Parses a UTC timestamp written by this or another client.
///
/// Accepts full RFC 3339; naive timestamps are assumed to be UTC.
pub fn parse_utc_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_datetime_flexible(value).map(|naive| naive.and_utc())
}
