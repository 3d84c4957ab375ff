// src/refresh.rs - Polling refresh scheduler module
use std::sync::{Arc, Weak};

use chrono::{DateTime, Local, Utc};
use log::{debug, error, info};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::{
    alerts::{event_alerts, reminder_alerts, todo_board, EventAlert, ReminderAlerts},
    todo::TodoRecord,
    Config, Note, NoteError, NoteQuery, NoteStorage, Result,
};

/// Everything the alert dashboards need, computed in one pass over the store.
#[derive(Debug, Clone, Default)]
pub struct AlertSnapshot {
    /// When the snapshot was taken; None only for the initial empty value.
    pub taken_at: Option<DateTime<Utc>>,
    pub reminders: ReminderAlerts,
    pub event_alerts: Vec<EventAlert>,
    pub overdue_todos: Vec<TodoRecord>,
}

impl AlertSnapshot {
    /// Computes the snapshot for a set of notes at an explicit time.
    /// Occurrence dates are judged against the local calendar day of `now`.
    pub fn compute(notes: &[Note], config: &Config, now: DateTime<Utc>) -> AlertSnapshot {
        let today = now.with_timezone(&Local).date_naive();
        AlertSnapshot {
            taken_at: Some(now),
            reminders: reminder_alerts(notes, now),
            event_alerts: event_alerts(notes, today, config.ack_window_start),
            overdue_todos: todo_board(notes, today).overdue,
        }
    }

    /// True when nothing demands attention.
    pub fn is_quiet(&self) -> bool {
        self.reminders.due.is_empty()
            && self.event_alerts.is_empty()
            && self.overdue_todos.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RefreshSchedulerStatus {
    /// Whether the scheduler is running
    pub is_running: bool,
    /// The time the last refresh completed
    pub last_refresh_time: Option<DateTime<Utc>>,
    /// Length of the polling window in seconds
    pub window_secs: u64,
}

#[derive(Debug, Clone)]
pub enum RefreshCommand {
    /// Recompute alerts immediately and restart the window
    RefreshNow,
    /// Stop the refresh scheduler
    Stop,
}

pub struct RefreshScheduler {
    /// Configuration for the scheduler
    config: Config,

    /// Channel to send commands to the scheduler task
    command_tx: mpsc::Sender<RefreshCommand>,

    /// Handle to the scheduler task
    scheduler_task: Option<JoinHandle<()>>,

    /// Whether the scheduler task is running
    is_running: bool,

    /// Weak reference to the storage
    storage: Option<Weak<Mutex<NoteStorage>>>,

    /// Latest snapshot, broadcast to subscribers after every refresh
    snapshot_tx: watch::Sender<AlertSnapshot>,
}

impl RefreshScheduler {
    /// Create a new refresh scheduler with the provided config
    pub fn new(config: Config) -> Self {
        debug!(
            "Initializing refresh scheduler with a {}s window",
            config.refresh_window_secs
        );
        let (command_tx, _) = mpsc::channel(10);
        let (snapshot_tx, _) = watch::channel(AlertSnapshot::default());

        Self {
            config,
            command_tx,
            scheduler_task: None,
            is_running: false,
            storage: None,
            snapshot_tx,
        }
    }

    /// Set the weak reference to NoteStorage
    pub fn set_storage(&mut self, storage: Arc<Mutex<NoteStorage>>) {
        self.storage = Some(Arc::downgrade(&storage));
        debug!("Storage reference set in RefreshScheduler");
    }

    /// Start the refresh scheduler
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting refresh scheduler...");
        if !self.config.auto_refresh {
            return Ok(()); // No need to start if auto refresh is disabled
        }

        let storage = match &self.storage {
            Some(weak) => match weak.upgrade() {
                Some(strong) => strong,
                None => {
                    error!("Failed to retrieve NoteStorage - reference is no longer valid.");
                    return Err(NoteError::ApplicationError {
                        message: "NoteStorage reference is no longer valid.".to_string(),
                    });
                }
            },
            None => {
                error!("No storage reference found in RefreshScheduler.");
                return Err(NoteError::ApplicationError {
                    message: "RefreshScheduler does not have a storage reference.".to_string(),
                });
            }
        };

        let (command_tx, mut command_rx) = mpsc::channel(10);
        self.command_tx = command_tx;

        let window = self.config.refresh_window_secs.max(1);
        let config = self.config.clone();
        let snapshot_tx = self.snapshot_tx.clone();
        let storage_clone = Arc::clone(&storage);

        let task = tokio::spawn(async move {
            // One tick per second; a refresh fires when the window runs out.
            let mut interval = time::interval(Duration::from_secs(1));
            interval.tick().await; // Initial tick
            let mut remaining = window;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        remaining -= 1;
                        if remaining > 0 {
                            continue;
                        }
                        remaining = window;
                        let storage = Arc::clone(&storage_clone);
                        match Self::refresh_once(&storage, &config, &snapshot_tx).await {
                            Ok(snapshot) => debug!(
                                "Scheduled refresh complete, {} alerts",
                                snapshot.event_alerts.len() + snapshot.reminders.due.len()
                            ),
                            Err(e) => error!("Scheduled refresh failed: {}", e),
                        }
                    }
                    Some(cmd) = command_rx.recv() => match cmd {
                        RefreshCommand::RefreshNow => {
                            remaining = window;
                            let storage = Arc::clone(&storage_clone);
                            match Self::refresh_once(&storage, &config, &snapshot_tx).await {
                                Ok(_) => info!("Manual refresh completed"),
                                Err(e) => error!("Manual refresh failed: {}", e),
                            }
                        },
                        RefreshCommand::Stop => {
                            info!("Refresh scheduler stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.scheduler_task = Some(task);
        self.is_running = true;

        Ok(())
    }

    /// One full refresh: reload the store, recompute alerts, broadcast.
    async fn refresh_once(
        storage: &Arc<Mutex<NoteStorage>>,
        config: &Config,
        snapshot_tx: &watch::Sender<AlertSnapshot>,
    ) -> Result<AlertSnapshot> {
        let notes = storage.lock().await.load_notes(&NoteQuery::default())?;
        let snapshot = AlertSnapshot::compute(&notes, config, Utc::now());
        info!(
            "Refresh complete: {} due reminders, {} event alerts, {} overdue todos",
            snapshot.reminders.due.len(),
            snapshot.event_alerts.len(),
            snapshot.overdue_todos.len()
        );
        snapshot_tx.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Stop the refresh scheduler if it's running
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.scheduler_task.take() {
            // Send stop command to the scheduler task
            if let Err(e) = self.command_tx.send(RefreshCommand::Stop).await {
                error!("Failed to send stop command to refresh scheduler: {}", e);
            }

            // The task may be mid-refresh, waiting on the storage lock our
            // caller holds. Bound the join and abort instead of waiting.
            let abort_handle = task.abort_handle();
            match time::timeout(Duration::from_secs(5), task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let error_mgs = format!("Failed to stop refresh scheduler: {}", e);
                    error!("{}", error_mgs);
                    return Err(NoteError::ApplicationError { message: error_mgs });
                }
                Err(_) => {
                    abort_handle.abort();
                    error!("Refresh scheduler did not stop within 5s, aborted");
                }
            }

            self.is_running = false;
            info!("Refresh scheduler stopped");
        } else {
            debug!("Refresh scheduler is not running");
        }

        Ok(())
    }

    /// Refresh immediately, regardless of where the window stands
    pub async fn refresh_now(&self) -> Result<()> {
        if !self.is_running {
            return Err(NoteError::ApplicationError {
                message: "Refresh scheduler is not running".to_string(),
            });
        }

        self.command_tx
            .send(RefreshCommand::RefreshNow)
            .await
            .map_err(|e| NoteError::ApplicationError {
                message: format!("Failed to send refresh command: {}", e),
            })?;

        Ok(())
    }

    /// Subscribe to snapshot broadcasts. The current value is the latest
    /// snapshot, or the empty default before the first refresh.
    pub fn subscribe(&self) -> watch::Receiver<AlertSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Get the current status of the refresh scheduler
    pub fn get_status(&self) -> RefreshSchedulerStatus {
        RefreshSchedulerStatus {
            is_running: self.is_running,
            last_refresh_time: self.snapshot_tx.borrow().taken_at,
            window_secs: self.config.refresh_window_secs.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn note(id: &str, content: &str) -> Note {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Note {
            id: id.to_string(),
            content: content.to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn snapshot_collects_all_alert_kinds() {
        let config = Config::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        let notes = vec![
            note("r", "meta::cadence::24h\nmeta::last_review::2026-08-20T00:00:00.000Z\n"),
            note(
                "e",
                "event_description: Anniversary\nevent_date: 2024-05-01\nevent_recurring_type: yearly\nmeta::event\n",
            ),
            note("t", "fix the fence\nmeta::todo\nmeta::end_date::2026-08-01\n"),
        ];

        let snapshot = AlertSnapshot::compute(&notes, &config, now);
        assert_eq!(snapshot.taken_at, Some(now));
        assert_eq!(snapshot.reminders.due.len(), 1);
        assert!(!snapshot.event_alerts.is_empty());
        assert_eq!(snapshot.overdue_todos.len(), 1);
        assert!(!snapshot.is_quiet());
    }

    #[test]
    fn snapshot_of_plain_notes_is_quiet() {
        let config = Config::default();
        let now = Utc.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap();
        let notes = vec![note("a", "groceries list\n"), note("b", "meeting notes\n")];

        let snapshot = AlertSnapshot::compute(&notes, &config, now);
        assert!(snapshot.is_quiet());
        assert!(snapshot.reminders.upcoming.is_empty());
    }
}
