use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use directories::ProjectDirs;
use log::debug;
use serde::{Deserialize, Serialize};
use which::which;

use crate::{countdown::CountdownUnit, NoteError, Result};

/// Default length of the polling window, in seconds.
pub const DEFAULT_REFRESH_WINDOW_SECS: u64 = 10;

/// Application configuration settings.
///
/// Every field has a serde default so configs written by older versions
/// keep loading.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory where notes are stored
    #[serde(default = "default_notes_dir")]
    pub notes_dir: PathBuf,

    /// Default editor command
    #[serde(default)]
    pub editor_command: Option<String>,

    /// Whether the store polls for changes and recomputes alerts
    #[serde(default)]
    pub auto_refresh: bool,

    /// Seconds between automatic refreshes
    #[serde(default = "default_refresh_window")]
    pub refresh_window_secs: u64,

    /// Earliest occurrence date that asks to be acknowledged
    #[serde(default = "default_ack_window_start")]
    pub ack_window_start: NaiveDate,

    /// Default unit for the countdown board
    #[serde(default)]
    pub countdown_unit: CountdownUnit,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            notes_dir: default_notes_dir(),
            editor_command: None,
            auto_refresh: false,
            refresh_window_secs: default_refresh_window(),
            ack_window_start: default_ack_window_start(),
            countdown_unit: CountdownUnit::default(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = ProjectDirs::from("", "", "metanotes") {
            return dirs.config_dir().join("config.json");
        }
        dirs::home_dir()
            .map(|home| home.join(".metanotes").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    /// Loads the config from the given path, or the default location.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| NoteError::ConfigError {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }

    /// Writes the config to the given path, or the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Config::default_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|_| NoteError::DirectoryError {
                    path: parent.to_path_buf(),
                })?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(&path, raw)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Updates one setting from its string form, as given to `config --set`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "notes_dir" => self.notes_dir = PathBuf::from(value),
            "editor_command" => {
                self.editor_command = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "auto_refresh" => {
                self.auto_refresh = value.parse().map_err(|_| NoteError::ConfigError {
                    message: format!("auto_refresh expects true or false, got {value}"),
                })?;
            }
            "refresh_window_secs" => {
                let secs: u64 = value.parse().map_err(|_| NoteError::ConfigError {
                    message: format!("refresh_window_secs expects a number, got {value}"),
                })?;
                if secs == 0 {
                    return Err(NoteError::ConfigError {
                        message: "refresh_window_secs must be at least 1".to_string(),
                    });
                }
                self.refresh_window_secs = secs;
            }
            "ack_window_start" => {
                self.ack_window_start =
                    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                        NoteError::ConfigError {
                            message: format!("ack_window_start expects YYYY-MM-DD, got {value}"),
                        }
                    })?;
            }
            "countdown_unit" => self.countdown_unit = value.parse()?,
            other => {
                return Err(NoteError::ConfigError {
                    message: format!("unknown setting: {other}"),
                });
            }
        }
        Ok(())
    }

    // This method provides smart fallbacks when no editor is configured
    pub fn get_editor_command(&self) -> String {
        // First try the configured editor
        if let Some(editor) = &self.editor_command {
            return editor.clone();
        }

        // Then try environment variable
        if let Ok(editor) = std::env::var("EDITOR") {
            return editor;
        }

        // Fall back to platform defaults
        if cfg!(windows) {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "open -t".to_string()
        } else {
            // Try common Linux editors
            for editor in &["nano", "vim", "vi", "emacs"] {
                if which(editor).is_ok() {
                    return editor.to_string();
                }
            }
            "nano".to_string()
        }
    }
}

fn default_notes_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", "metanotes") {
        return dirs.data_dir().join("notes");
    }
    dirs::home_dir()
        .map(|home| home.join(".metanotes").join("notes"))
        .unwrap_or_else(|| PathBuf::from("notes"))
}

fn default_refresh_window() -> u64 {
    DEFAULT_REFRESH_WINDOW_SECS
}

fn default_ack_window_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_behavior() {
        let config = Config::default();
        assert_eq!(config.refresh_window_secs, 10);
        assert_eq!(
            config.ack_window_start,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
        assert_eq!(config.countdown_unit, CountdownUnit::Days);
        assert!(!config.auto_refresh);
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let config: Config = serde_json::from_str(r#"{"notes_dir":"/tmp/n"}"#).unwrap();
        assert_eq!(config.notes_dir, PathBuf::from("/tmp/n"));
        assert_eq!(config.refresh_window_secs, 10);
        assert_eq!(
            config.ack_window_start,
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
    }

    #[test]
    fn set_updates_each_known_key() {
        let mut config = Config::default();
        config.set("notes_dir", "/tmp/other").unwrap();
        config.set("editor_command", "vim").unwrap();
        config.set("auto_refresh", "true").unwrap();
        config.set("refresh_window_secs", "30").unwrap();
        config.set("ack_window_start", "2026-01-01").unwrap();
        config.set("countdown_unit", "weeks").unwrap();

        assert_eq!(config.notes_dir, PathBuf::from("/tmp/other"));
        assert_eq!(config.editor_command.as_deref(), Some("vim"));
        assert!(config.auto_refresh);
        assert_eq!(config.refresh_window_secs, 30);
        assert_eq!(config.countdown_unit, CountdownUnit::Weeks);

        assert!(config.set("refresh_window_secs", "0").is_err());
        assert!(config.set("ack_window_start", "April 1st").is_err());
        assert!(config.set("nonsense", "x").is_err());
    }

    #[test]
    fn load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let missing = Config::load(Some(&path)).unwrap();
        assert_eq!(missing.refresh_window_secs, 10);

        let mut config = Config::default();
        config.set("refresh_window_secs", "42").unwrap();
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.refresh_window_secs, 42);
    }
}
