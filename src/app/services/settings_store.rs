//! Process settings: loaded once, written through on every update.
//!
//! Persistence is best effort. Read or write failures are logged and the
//! in-memory record stays authoritative.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::app::domain::settings::AppSettings;
use crate::app::infrastructure::atomic_write::write_atomic;
use crate::app::infrastructure::error::AppError;
use crate::app::infrastructure::paths;

pub struct SettingsStore {
    path: PathBuf,
    current: AppSettings,
}

impl SettingsStore {
    /// Load from the platform config location.
    pub fn load() -> Self {
        Self::load_from(paths::settings_path())
    }

    /// Load settings from `path`, or defaults if the file is missing or corrupt.
    pub fn load_from(path: PathBuf) -> Self {
        let current = match fs::read_to_string(&path) {
            Ok(contents) => match AppSettings::from_json(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Failed to parse settings: {}. Using defaults.", e);
                    AppSettings::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // First run: try to save defaults for next time
                let store = Self {
                    path,
                    current: AppSettings::default(),
                };
                store.flush();
                return store;
            }
            Err(e) => {
                log::warn!("Failed to read settings: {}. Using defaults.", e);
                AppSettings::default()
            }
        };

        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &AppSettings {
        &self.current
    }

    /// Apply `mutate` to the record and persist it immediately.
    pub fn update<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut AppSettings),
    {
        mutate(&mut self.current);
        self.current.sanitize();
        self.flush();
    }

    /// Write the current record to disk, logging instead of failing.
    pub fn flush(&self) {
        if let Err(e) = self.save() {
            log::warn!("Failed to save settings to {}: {}", self.path.display(), e);
        }
    }

    fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = self.current.to_json()?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}
