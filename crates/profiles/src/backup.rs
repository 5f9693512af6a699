//! Backup schedule configuration and calendar arithmetic.
//!
//! Schedules are persisted as plain JSON, one file per user. Uploads from
//! a backup run land under a timestamp prefix (`dd.mm.YYYY.HH.MM.SS`), so
//! consecutive runs never overwrite each other; manual runs get a `NOW.`
//! prefix on top.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::vault::ProfileError;

const STAMP_FORMAT: &str = "%d.%m.%Y.%H.%M.%S";

/// When a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackupMode {
    /// Every day at the configured time.
    Daily,
    /// Once a week; `weekday` counts from Monday (0) to Sunday (6).
    Weekly { weekday: u8 },
    /// A single run on a fixed date; expires once that moment passes.
    Once { date: NaiveDate },
}

/// A user's backup schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Local folders included in each run.
    pub folders: Vec<PathBuf>,
    #[serde(flatten)]
    pub mode: BackupMode,
    /// Time of day the run starts.
    pub time: NaiveTime,
}

impl BackupConfig {
    /// The next moment this schedule fires, strictly after `now`.
    ///
    /// Daily schedules roll to tomorrow once today's time has passed,
    /// weekly ones roll a full week. A one-shot schedule in the past
    /// returns `None`: it has expired and the caller removes the config.
    pub fn next_run(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match &self.mode {
            BackupMode::Daily => {
                let today: NaiveDateTime = now.date().and_time(self.time);
                if today > now {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            BackupMode::Weekly { weekday } => {
                let target: u8 = weekday % 7;
                let today_wd: u8 = now.date().weekday().num_days_from_monday() as u8;
                let mut days_ahead: u8 = (target + 7 - today_wd) % 7;
                if days_ahead == 0 && now.date().and_time(self.time) <= now {
                    days_ahead = 7;
                }
                Some((now.date() + Duration::days(i64::from(days_ahead))).and_time(self.time))
            }
            BackupMode::Once { date } => {
                let run: NaiveDateTime = date.and_time(self.time);
                (run > now).then_some(run)
            }
        }
    }

    /// Default config location for one user
    /// (`<config_dir>/swiftdesk/backup-{username}.json`).
    pub fn default_path(username: &str) -> Result<PathBuf, ProfileError> {
        Ok(dirs::config_dir()
            .ok_or(ProfileError::NoConfigDir)?
            .join("swiftdesk")
            .join(format!("backup-{username}.json")))
    }

    /// Load a schedule; `None` when no config exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, ProfileError> {
        let raw: String = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ProfileError::Io {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })
            }
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), ProfileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProfileError::Io {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let raw: String = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|e| ProfileError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Remove a schedule (used when a one-shot config expires).
    pub fn remove(path: &Path) -> Result<(), ProfileError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ProfileError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }
}

/// Timestamp prefix for a scheduled run.
pub fn backup_stamp(now: NaiveDateTime) -> String {
    now.format(STAMP_FORMAT).to_string()
}

/// Timestamp prefix for a manual run.
pub fn manual_stamp(now: NaiveDateTime) -> String {
    format!("NOW.{}", backup_stamp(now))
}
