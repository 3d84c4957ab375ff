use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{mpsc as std_mpsc, Arc, Mutex},
    time::Duration,
};

use chrono::{Local, Utc};
use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use log::{debug, error, info, trace, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use walkdir::WalkDir;

use crate::{
    handle_fs_event, load_note_from_file, AlertSnapshot, Config, Note, NoteError, NoteQuery,
    RefreshScheduler, RefreshSchedulerStatus, Result,
};

/// Manages the storage, retrieval, and synchronization of notes.
///
/// Notes live on disk as one JSON file each; an in-memory cache fronts them.
/// Writes are last-write-wins: the newest save replaces the file whole. A
/// file watcher keeps the cache in step with edits made by other programs.
pub struct NoteStorage {
    /// Application configuration
    config: Config,

    /// In-memory cache of notes, indexed by note ID
    notes_cache: Arc<Mutex<HashMap<String, Note>>>,

    /// File system watcher to detect changes to note files
    watcher: Option<RecommendedWatcher>,

    /// Flag indicating if the storage system is ready
    initialized: bool,

    /// Scheduler that periodically recomputes alerts from the store
    refresh_scheduler: Arc<TokioMutex<RefreshScheduler>>,
}

impl NoteStorage {
    /// Creates a new NoteStorage instance with the provided configuration.
    ///
    /// The instance is inert until [`initialize`](Self::initialize) runs:
    /// no directories are created, nothing is loaded, and the watcher and
    /// refresh scheduler stay idle.
    pub fn new(config: Config) -> Self {
        // Initialize empty notes cache
        let notes_cache = Arc::new(Mutex::new(HashMap::new()));

        // Initialize scheduler
        let refresh_scheduler = RefreshScheduler::new(config.clone());

        Self {
            config,
            notes_cache,
            watcher: None,
            initialized: false,
            refresh_scheduler: Arc::new(TokioMutex::new(refresh_scheduler)),
        }
    }

    /// Initializes the storage system, loading notes and starting the
    /// refresh scheduler when auto refresh is enabled.
    pub async fn initialize(&mut self, storage: Arc<TokioMutex<NoteStorage>>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        info!(
            "Initializing NoteStorage with notes_dir={}",
            self.config.notes_dir.display()
        );

        // Ensure notes directory exists
        if !self.config.notes_dir.exists() {
            debug!(
                "Notes directory does not exist, creating: {}",
                self.config.notes_dir.display()
            );
            fs::create_dir_all(&self.config.notes_dir).map_err(|e| {
                error!("Failed to create notes directory: {}", e);
                NoteError::DirectoryError {
                    path: self.config.notes_dir.clone(),
                }
            })?;
        }

        // Load existing notes into cache
        debug!("Loading notes into storage");
        self.load_from_disk()?;
        info!("Loaded notes successfully");

        {
            let mut scheduler = self.refresh_scheduler.lock().await;
            scheduler.set_storage(Arc::clone(&storage)); // Set weak reference

            match scheduler.start().await {
                Ok(_) => info!("Refresh scheduler started successfully"),
                Err(e) => error!("Failed to start refresh scheduler: {}", e),
            }
        } // Lock is dropped here explicitly

        // Initialize the file watcher synchronously
        // but do the actual watching in a background task
        self.init_watcher_with_background_task().await?;

        info!("NoteStorage initialization complete");

        self.initialized = true;

        Ok(())
    }

    /// Loads all notes from disk into the in-memory cache
    ///
    /// # Returns
    ///
    /// The number of notes loaded in case of success or an error
    pub fn load_from_disk(&mut self) -> Result<usize> {
        // Ensure notes directory exists
        if !self.config.notes_dir.exists() {
            fs::create_dir_all(&self.config.notes_dir).map_err(NoteError::Io)?;
            info!(
                "Created notes directory: {}",
                self.config.notes_dir.display()
            );
            self.initialized = true;
            return Ok(0); // No notes to load from an empty directory
        }

        // Collect all notes before acquiring the lock
        let mut notes_buffer = HashMap::new();
        let mut load_errors = 0;

        for entry in WalkDir::new(&self.config.notes_dir)
            .min_depth(1) // Skip the root directory
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            // Only process JSON files
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                match load_note_from_file(path) {
                    Ok(note) => {
                        notes_buffer.insert(note.id.clone(), note);
                    }
                    Err(e) => {
                        // Collect errors but continue processing
                        warn!("Failed to load note from {}: {}", path.display(), e);
                        load_errors += 1;
                    }
                }
            }
        }

        let notes_count = notes_buffer.len();

        // Acquire the lock only once to swap in the fresh cache contents
        match self.notes_cache.lock() {
            Ok(mut cache) => {
                cache.clear();
                cache.extend(notes_buffer);
                info!("Loaded {} notes into cache", notes_count);
            }
            Err(_) => {
                return Err(NoteError::LockAcquisitionFailed {
                    message: "Failed to acquire lock on notes cache during load operation"
                        .to_string(),
                });
            }
        }

        if load_errors > 0 {
            error!("Encountered {} errors while loading notes", load_errors);
        }

        self.initialized = true;
        Ok(notes_count)
    }

    /// Loads notes matching a query.
    ///
    /// With no filters the whole store comes back newest first. A text
    /// query switches to fuzzy ranking, best match first; the summary line
    /// weighs more than the body.
    pub fn load_notes(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        // Acquire the lock only to clone the required data
        let notes_snapshot = {
            // Scope the lock to this block
            let cache = self
                .notes_cache
                .lock()
                .map_err(|_| NoteError::LockAcquisitionFailed {
                    message: "Failed to acquire lock on notes cache".to_string(),
                })?;

            debug!("Querying {} notes in cache", cache.len());

            // Clone all notes to process outside the lock
            cache.values().cloned().collect::<Vec<Note>>()
        }; // Lock is automatically released here when 'cache' goes out of scope

        if query.is_empty() {
            let mut notes = notes_snapshot;
            notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            debug!("Query matched {} notes", notes.len());
            return Ok(notes);
        }

        // Process the data without holding the lock
        let mut notes: Vec<Note> = notes_snapshot
            .into_iter()
            .filter(|note| match query.created_on {
                Some(date) => note.created_at.with_timezone(&Local).date_naive() == date,
                None => true,
            })
            .collect();

        match &query.text {
            Some(text) if !text.trim().is_empty() => {
                notes = rank_by_relevance(notes, text);
            }
            _ => {
                // Newest first
                notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }

        debug!("Query matched {} notes", notes.len());
        Ok(notes)
    }

    /// Creates a note from raw content and persists it.
    pub fn create_note(&self, content: String) -> Result<Note> {
        let note = Note::new(content);

        // Timestamps make collisions unlikely, but a clashing ID would
        // silently replace someone else's note.
        let exists = self
            .notes_cache
            .lock()
            .map(|cache| cache.contains_key(&note.id))
            .unwrap_or(false);
        if exists {
            return Err(NoteError::NoteAlreadyExists { id: note.id });
        }

        self.save_note(&note)?;
        Ok(note)
    }

    /// Retrieves a note by its ID from the storage
    /// Returns Some(Note) if found, or None if not found
    pub fn get_note_by_id(&self, note_id: &str) -> Option<Note> {
        debug!("Retrieving note by ID: {}", note_id);

        // First, try to get from cache
        match self.notes_cache.lock() {
            Ok(cache) => {
                // If found in cache, clone and return it
                if let Some(note) = cache.get(note_id) {
                    trace!("Note found in cache: {}", note_id);
                    return Some(note.clone());
                }
            }
            Err(e) => {
                error!("Failed to acquire lock on cache: {}", e);
                // Fall through to file system check
            }
        }

        // Not found in cache or couldn't access cache, try to load from disk
        debug!("Note not found in cache, checking file system: {}", note_id);
        let file_path = self.note_path(note_id);

        if file_path.exists() {
            debug!("Note file exists at: {}", file_path.display());
            match load_note_from_file(&file_path) {
                Ok(note) => {
                    // Update cache with the found note
                    if let Ok(mut cache) = self.notes_cache.lock() {
                        trace!("Updating cache with note loaded from disk");
                        cache.insert(note_id.to_string(), note.clone());
                    } else {
                        warn!("Failed to acquire lock to update cache");
                    }
                    return Some(note);
                }
                Err(e) => {
                    error!("Error loading note from file: {}", e);
                    return None;
                }
            }
        }

        // Not found
        debug!("Note not found: {}", note_id);
        None
    }

    /// Replaces a note's content, stamping a fresh update time. The ID and
    /// creation time never change. Last write wins.
    pub fn update_note_by_id(&self, note_id: &str, content: String) -> Result<Note> {
        info!("Updating note: {}", note_id);

        let original = match self.get_note_by_id(note_id) {
            Some(note) => note,
            None => {
                let error_msg = format!("Cannot update note {}: Note not found", note_id);
                error!("{}", error_msg);
                return Err(NoteError::NoteNotFound {
                    id: note_id.to_string(),
                });
            }
        };

        let updated = Note {
            id: original.id,
            content,
            created_at: original.created_at,
            updated_at: Utc::now(),
        };

        self.save_note(&updated)?;
        info!("Note {} updated successfully", note_id);
        Ok(updated)
    }

    /// Deletes a note from both the file system and the in-memory cache
    pub fn delete_note_by_id(&self, note_id: &str) -> Result<()> {
        info!("Deleting note: {}", note_id);

        if self.get_note_by_id(note_id).is_none() {
            let error_msg = format!("Cannot delete note {}: Note not found", note_id);
            error!("{}", error_msg);
            return Err(NoteError::NoteNotFound {
                id: note_id.to_string(),
            });
        }

        // Get the file path for the note
        let file_path = self.note_path(note_id);

        // Delete from filesystem
        if file_path.exists() {
            debug!("Deleting note file: {}", file_path.display());
            match fs::remove_file(&file_path) {
                Ok(_) => {
                    debug!("Note file deleted successfully");

                    // Clean up the prefix directory if this was its last note
                    if let Some(parent) = file_path.parent() {
                        if parent != self.config.notes_dir {
                            self.cleanup_empty_directory(parent);
                        }
                    }
                }
                Err(e) => {
                    let error_msg =
                        format!("Failed to delete note file {}: {}", file_path.display(), e);
                    error!("{}", error_msg);
                    return Err(NoteError::Io(e));
                }
            }
        } else {
            debug!("Note file doesn't exist on disk, only removing from cache");
        }

        // Remove from cache
        match self.notes_cache.lock() {
            Ok(mut cache) => {
                cache.remove(note_id);
                debug!("Note removed from cache");
            }
            Err(e) => {
                // Since we've already deleted the file, just log this error but don't fail
                warn!(
                    "Failed to acquire lock to update cache after deletion: {}",
                    e
                );
            }
        }

        info!("Note {} successfully deleted", note_id);
        Ok(())
    }

    /// Saves a note to storage using atomic operations to prevent data corruption
    pub fn save_note(&self, note: &Note) -> Result<()> {
        info!("Saving note: {}", note.id);

        // Generate the file path based on the note id
        let file_path = self.note_path(&note.id);
        debug!("File path for note: {}", file_path.display());

        // Ensure the parent directory exists
        if let Some(parent) = file_path.parent() {
            if !parent.exists() {
                debug!("Creating parent directory: {}", parent.display());
                fs::create_dir_all(parent).map_err(|e| {
                    error!("Failed to create directory {}: {}", parent.display(), e);
                    NoteError::Io(e)
                })?;
            }
        }

        // Create a temporary file in the same directory (for atomic operation)
        let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            NoteError::Io(e)
        })?;

        // Serialize the note to JSON
        trace!("Serializing note to JSON");
        let json = serde_json::to_string_pretty(note).map_err(|e| {
            error!("Failed to serialize note: {}", e);
            NoteError::Serialization(e)
        })?;

        // Write to the temporary file
        trace!("Writing to temporary file");
        temp_file.write_all(json.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            NoteError::Io(e)
        })?;
        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            NoteError::Io(e)
        })?;

        // Atomically move the temporary file to the target location
        debug!("Performing atomic move of temporary file to final location");
        temp_file.persist(&file_path).map_err(|e| {
            error!(
                "Failed to persist file {}: {}",
                file_path.display(),
                e.error
            );
            NoteError::Io(e.error)
        })?;

        // Update the cache as well
        debug!("Updating note in cache");
        match self.notes_cache.lock() {
            Ok(mut cache) => {
                cache.insert(note.id.clone(), note.clone());
                trace!("Cache updated successfully");
            }
            Err(e) => {
                // Continue since the file is saved already; the watcher
                // will reconcile the cache eventually
                warn!("Failed to acquire lock for cache update: {}", e);
            }
        }

        info!("Note saved successfully: {}", note.id);
        Ok(())
    }

    /// Helper method to get the file path for a note
    fn note_path(&self, note_id: &str) -> PathBuf {
        // Create path with structure: notes_dir/first_2_chars_of_id/note_id.json
        let id_prefix = if note_id.len() >= 2 {
            &note_id[0..2]
        } else {
            note_id
        };

        self.config
            .notes_dir
            .join(id_prefix)
            .join(format!("{}.json", note_id))
    }

    /// Helper method to recursively clean up empty directories
    ///
    /// Checks if a directory is empty and removes it if it is.
    /// Then checks its parent directory and does the same recursively.
    fn cleanup_empty_directory(&self, dir_path: &Path) {
        // Skip if this is the root notes directory or doesn't exist
        if !dir_path.exists() || dir_path == self.config.notes_dir {
            return;
        }

        // Check if the directory is empty
        match fs::read_dir(dir_path) {
            Ok(entries) => {
                if entries.count() == 0 {
                    debug!("Removing empty directory: {}", dir_path.display());
                    match fs::remove_dir(dir_path) {
                        Ok(_) => {
                            // Recursively check parent directory
                            if let Some(parent) = dir_path.parent() {
                                if parent != self.config.notes_dir {
                                    self.cleanup_empty_directory(parent);
                                }
                            }
                        }
                        Err(e) => warn!(
                            "Failed to remove empty directory {}: {}",
                            dir_path.display(),
                            e
                        ),
                    }
                }
            }
            Err(e) => warn!("Failed to read directory {}: {}", dir_path.display(), e),
        }
    }

    /// Initializes the watcher and starts the event handling in the background
    async fn init_watcher_with_background_task(&mut self) -> Result<()> {
        // Only initialize once
        if self.watcher.is_some() {
            debug!("File system watcher already initialized");
            return Ok(());
        }

        // Create a standard mpsc channel for notify crate
        let (std_tx, std_rx) = std_mpsc::channel();

        // Create a tokio mpsc channel for async event handling
        let (tx, mut rx) = mpsc::channel(100);

        // Initialize the watcher with the std_tx channel
        let mut watcher: RecommendedWatcher = Watcher::new(
            std_tx,
            notify::Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| {
            NoteError::Io(std::io::Error::other(format!(
                "Failed to create file watcher: {}",
                e
            )))
        })?;

        // Start watching the notes directory
        watcher
            .watch(self.config.notes_dir.as_ref(), RecursiveMode::Recursive)
            .map_err(|e| {
                NoteError::Io(std::io::Error::other(format!(
                    "Failed to watch directory: {}",
                    e
                )))
            })?;

        // Store the watcher in the struct field
        self.watcher = Some(watcher);

        // Set up references for the event handler
        let notes_cache = Arc::clone(&self.notes_cache);

        // Spawn a background task to bridge the standard channel to tokio channel
        tokio::spawn(async move {
            // This task will run until the std_rx channel is closed
            // (which happens when the watcher is dropped)
            while let Ok(event) = std_rx.recv() {
                match tx.send(event).await {
                    Ok(_) => {}
                    Err(e) => {
                        error!("Failed to forward file system event: {}", e);
                        break;
                    }
                }
            }
            debug!("File system event bridge task stopped");
        });

        // Spawn a task to handle the events from tokio channel
        tokio::spawn(async move {
            debug!("File system watcher event handler task started");

            while let Some(event) = rx.recv().await {
                match event {
                    Ok(event) => {
                        debug!("File system event: {:?}", event.kind);
                        handle_fs_event(event, &notes_cache).await;
                    }
                    Err(e) => error!("File system watcher error: {}", e),
                }
            }

            debug!("File system watcher event handler task stopped");
        });

        info!(
            "File system watcher initialized for directory: {}",
            self.config.notes_dir.display()
        );
        Ok(())
    }

    /// Get the current refresh scheduler status
    pub async fn refresh_status(&self) -> RefreshSchedulerStatus {
        let scheduler = self.refresh_scheduler.lock().await;
        scheduler.get_status()
    }

    /// Manually trigger an alert refresh
    pub async fn refresh_now(&self) -> Result<()> {
        let scheduler = self.refresh_scheduler.lock().await;
        scheduler.refresh_now().await
    }

    /// Subscribe to alert snapshots produced by the refresh scheduler
    pub async fn subscribe_alerts(&self) -> watch::Receiver<AlertSnapshot> {
        let scheduler = self.refresh_scheduler.lock().await;
        scheduler.subscribe()
    }

    /// Stop the refresh scheduler
    pub async fn stop_refresh_scheduler(&self) -> Result<()> {
        let mut scheduler = self.refresh_scheduler.lock().await;
        scheduler.stop().await
    }

    /// Stops the file system watcher and releases its resources
    pub async fn stop_watcher(&mut self) -> Result<()> {
        info!("Stopping file system watcher...");

        // Check if the watcher is running
        if let Some(watcher) = self.watcher.take() {
            debug!("File watcher instance found, shutting down");

            // Drop the watcher, which closes its channels and stops watching
            drop(watcher);

            // Wait for a short time to allow background tasks to clean up
            tokio::time::sleep(Duration::from_millis(200)).await;

            info!("File system watcher stopped successfully");
        } else {
            debug!("No active file watcher to stop");
        }

        Ok(())
    }

    /// Performs a complete shutdown of the storage system, including
    /// stopping the file watcher and refresh scheduler
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down NoteStorage...");

        // Set a shutdown flag to prevent new operations
        self.initialized = false;

        // Track any errors during shutdown
        let mut shutdown_errors = Vec::new();

        // First, stop the refresh scheduler to prevent new refresh operations
        match self.stop_refresh_scheduler().await {
            Ok(_) => debug!("Refresh scheduler stopped successfully"),
            Err(e) => {
                let error_msg = format!("Error stopping refresh scheduler: {}", e);
                warn!("{}", error_msg);
                shutdown_errors.push(error_msg);
                // Continue with shutdown despite this error
            }
        }

        // Next, stop the file watcher
        match self.stop_watcher().await {
            Ok(_) => debug!("File watcher stopped successfully"),
            Err(e) => {
                let error_msg = format!("Error stopping file watcher: {}", e);
                warn!("{}", error_msg);
                shutdown_errors.push(error_msg);
                // Continue with shutdown despite this error
            }
        }

        // Flush any pending changes with timeout
        match tokio::time::timeout(Duration::from_secs(5), self.flush_cache_to_disk()).await {
            Ok(result) => {
                if let Err(e) = result {
                    let error_msg = format!("Error flushing cache to disk: {}", e);
                    warn!("{}", error_msg);
                    shutdown_errors.push(error_msg);
                } else {
                    debug!("Cache flushed successfully");
                }
            }
            Err(_) => {
                let error_msg = "Timed out while flushing cache to disk";
                warn!("{}", error_msg);
                shutdown_errors.push(error_msg.to_string());
            }
        }

        // Final shutdown status report
        if shutdown_errors.is_empty() {
            info!("NoteStorage shutdown complete - all components shut down cleanly");
            Ok(())
        } else {
            let error_msg = format!(
                "NoteStorage shutdown completed with {} errors",
                shutdown_errors.len()
            );
            warn!("{}", error_msg);
            Err(NoteError::ApplicationError { message: error_msg })
        }
    }

    /// Flush in-memory cache to disk to ensure all changes are persisted
    async fn flush_cache_to_disk(&self) -> Result<()> {
        debug!("Flushing cache to disk...");

        let notes = {
            match self.notes_cache.lock() {
                Ok(cache) => {
                    // Clone notes for processing outside of lock
                    cache.values().cloned().collect::<Vec<Note>>()
                }
                Err(e) => {
                    warn!("Failed to acquire cache lock during flush: {}", e);
                    return Err(NoteError::LockAcquisitionFailed {
                        message: "Failed to acquire lock during flush operation".to_string(),
                    });
                }
            }
        };

        // Track any errors during flush
        let mut error_count = 0;

        // Save each note to ensure it's on disk
        for note in notes {
            if let Err(e) = self.save_note(&note) {
                error_count += 1;
                warn!("Failed to flush note {}: {}", note.id, e);
                // Continue with other notes despite this error
            }
        }

        if error_count > 0 {
            warn!("Completed cache flush with {} errors", error_count);
            Err(NoteError::ApplicationError {
                message: format!("Failed to flush {} notes during shutdown", error_count),
            })
        } else {
            debug!("Cache flush completed successfully");
            Ok(())
        }
    }
}

/// Fuzzy-ranks notes against a query, best match first. The summary line
/// counts double, the way a title would.
fn rank_by_relevance(notes: Vec<Note>, query: &str) -> Vec<Note> {
    let matcher = SkimMatcherV2::default();

    // Notes paired with their relevance score
    let mut matched: Vec<(i64, Note)> = notes
        .into_iter()
        .filter_map(|note| {
            let summary_score = matcher.fuzzy_match(&note.summary(), query).unwrap_or(0);
            let content_score = matcher.fuzzy_match(&note.content, query).unwrap_or(0);
            let final_score = summary_score * 2 + content_score;

            if final_score > 0 {
                trace!("Note matched with score {}: {}", final_score, note.id);
                Some((final_score, note))
            } else {
                None
            }
        })
        .collect();

    // Highest score first
    matched.sort_by(|a, b| b.0.cmp(&a.0));
    matched.into_iter().map(|(_, note)| note).collect()
}

// Implement Clone for NoteStorage to use in closures
impl Clone for NoteStorage {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            notes_cache: Arc::clone(&self.notes_cache),
            watcher: None,
            initialized: self.initialized,
            refresh_scheduler: Arc::clone(&self.refresh_scheduler),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn storage_in(dir: &Path) -> NoteStorage {
        let config = Config {
            notes_dir: dir.join("notes"),
            ..Config::default()
        };
        let mut storage = NoteStorage::new(config);
        storage.load_from_disk().unwrap();
        storage
    }

    #[test]
    fn create_get_update_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        let note = storage.create_note("first draft".to_string()).unwrap();
        assert_eq!(
            storage.get_note_by_id(&note.id).unwrap().content,
            "first draft"
        );

        let updated = storage
            .update_note_by_id(&note.id, "second draft".to_string())
            .unwrap();
        assert_eq!(updated.id, note.id);
        assert_eq!(updated.created_at, note.created_at);
        assert!(updated.updated_at >= note.updated_at);
        assert_eq!(
            storage.get_note_by_id(&note.id).unwrap().content,
            "second draft"
        );

        storage.delete_note_by_id(&note.id).unwrap();
        assert!(storage.get_note_by_id(&note.id).is_none());
        assert!(!storage.note_path(&note.id).exists());
    }

    #[test]
    fn notes_survive_a_fresh_storage_instance() {
        let dir = tempfile::tempdir().unwrap();
        let note = {
            let storage = storage_in(dir.path());
            storage.create_note("persisted note".to_string()).unwrap()
        };

        let storage = storage_in(dir.path());
        let loaded = storage.get_note_by_id(&note.id).unwrap();
        assert_eq!(loaded.content, "persisted note");
        assert_eq!(loaded.created_at, note.created_at);
    }

    #[test]
    fn note_files_are_sharded_by_id_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        let note = storage.create_note("sharded".to_string()).unwrap();
        let path = storage.note_path(&note.id);
        assert!(path.exists());
        assert_eq!(
            path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()),
            Some(&note.id[0..2])
        );

        // Deleting the last note in a shard removes the directory too
        storage.delete_note_by_id(&note.id).unwrap();
        assert!(!path.parent().unwrap().exists());
    }

    #[test]
    fn unfiltered_query_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        let older = Note {
            id: "aa-older".to_string(),
            content: "older".to_string(),
            created_at: Utc::now() - ChronoDuration::days(2),
            updated_at: Utc::now() - ChronoDuration::days(2),
        };
        let newer = Note {
            id: "bb-newer".to_string(),
            content: "newer".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        storage.save_note(&older).unwrap();
        storage.save_note(&newer).unwrap();

        let notes = storage.load_notes(&NoteQuery::default()).unwrap();
        let ids: Vec<&str> = notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["bb-newer", "aa-older"]);
    }

    #[test]
    fn created_on_filter_matches_the_local_calendar_day() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        let today_note = storage.create_note("written today".to_string()).unwrap();
        let old = Note {
            id: "cc-old".to_string(),
            content: "written long ago".to_string(),
            created_at: Utc::now() - ChronoDuration::days(30),
            updated_at: Utc::now() - ChronoDuration::days(30),
        };
        storage.save_note(&old).unwrap();

        let query = NoteQuery {
            created_on: Some(Local::now().date_naive()),
            ..NoteQuery::default()
        };
        let notes = storage.load_notes(&query).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, today_note.id);
    }

    #[test]
    fn text_query_ranks_summary_matches_first() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        storage
            .create_note("groceries\nremember the dentist appointment".to_string())
            .unwrap();
        let dentist = storage
            .create_note("dentist visit\nbring the insurance card".to_string())
            .unwrap();
        storage.create_note("totally unrelated".to_string()).unwrap();

        let query = NoteQuery {
            text: Some("dentist".to_string()),
            ..NoteQuery::default()
        };
        let notes = storage.load_notes(&query).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].id, dentist.id);
    }

    #[test]
    fn missing_notes_surface_not_found_errors() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(dir.path());

        assert!(matches!(
            storage.update_note_by_id("nope", "x".to_string()),
            Err(NoteError::NoteNotFound { .. })
        ));
        assert!(matches!(
            storage.delete_note_by_id("nope"),
            Err(NoteError::NoteNotFound { .. })
        ));
    }
}
