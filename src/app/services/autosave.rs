//! Periodic autosave.
//!
//! A sweep runs in three steps so that file I/O can leave the owner thread:
//! [`AutosavePolicy::collect`] snapshots the dirty documents into jobs,
//! [`run_jobs`] performs the writes (anywhere), and [`apply_outcomes`] clears
//! the modified flags back on the owner thread.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::app::controllers::tabs::DocumentSet;
use crate::app::domain::document::{Document, DocumentId};
use crate::app::domain::messages::Message;
use crate::app::domain::settings::AppSettings;
use crate::app::infrastructure::atomic_write::write_atomic;

const SNAPSHOT_PREFIX: &str = "autosave_";
const SNAPSHOT_SUFFIX: &str = ".txt";
const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveTarget {
    /// Overwrite the document's own file; counts as a save
    OriginalPath(PathBuf),
    /// Recovery copy in the autosave directory; the document stays modified
    Snapshot(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AutosaveJob {
    pub doc: DocumentId,
    pub revision: u64,
    pub target: AutosaveTarget,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveOutcome {
    pub doc: DocumentId,
    pub revision: u64,
    pub target: AutosaveTarget,
    pub succeeded: bool,
}

pub struct AutosavePolicy {
    enabled: bool,
    interval: Duration,
    retention: Duration,
    dir: PathBuf,
}

/// `autosave_{identity}_{yyyyMMdd_HHmmss}.txt`
pub fn snapshot_file_name(identity: Uuid, at: DateTime<Local>) -> String {
    format!(
        "{}{}_{}{}",
        SNAPSHOT_PREFIX,
        identity.simple(),
        at.format("%Y%m%d_%H%M%S"),
        SNAPSHOT_SUFFIX
    )
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX)
}

impl AutosavePolicy {
    pub fn new(dir: PathBuf, enabled: bool, interval_secs: u32, retention_days: u32) -> Self {
        Self {
            enabled,
            interval: Duration::from_secs(u64::from(interval_secs.max(1))),
            retention: Duration::from_secs(u64::from(retention_days) * SECS_PER_DAY),
            dir,
        }
    }

    pub fn from_settings(dir: PathBuf, settings: &AppSettings) -> Self {
        Self::new(
            dir,
            settings.is_auto_save_enabled,
            settings.auto_save_interval_seconds,
            settings.auto_save_retention_days,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval_secs(&mut self, secs: u32) {
        self.interval = Duration::from_secs(u64::from(secs.max(1)));
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_target(&self, doc: &Document, now: DateTime<Local>) -> AutosaveTarget {
        AutosaveTarget::Snapshot(self.dir.join(snapshot_file_name(doc.identity(), now)))
    }

    fn modified_jobs<F>(docs: &DocumentSet, target: F) -> Vec<AutosaveJob>
    where
        F: Fn(&Document) -> AutosaveTarget,
    {
        docs.documents()
            .iter()
            .filter(|d| d.is_modified())
            .map(|d| AutosaveJob {
                doc: d.id,
                revision: d.revision(),
                target: target(d),
                content: d.content().to_string(),
            })
            .collect()
    }

    /// Build write jobs for every modified document.
    pub fn collect(&self, docs: &DocumentSet, now: DateTime<Local>) -> Vec<AutosaveJob> {
        if !self.enabled {
            return Vec::new();
        }

        Self::modified_jobs(docs, |d| match d.file_path() {
            Some(path) => AutosaveTarget::OriginalPath(path.to_path_buf()),
            None => self.snapshot_target(d, now),
        })
    }

    /// Snapshot jobs for every modified document, whatever the policy says.
    ///
    /// Used when the session ends without anyone to answer the save prompts:
    /// files on disk stay untouched and the edits land in the autosave directory.
    pub fn collect_recovery(&self, docs: &DocumentSet, now: DateTime<Local>) -> Vec<AutosaveJob> {
        Self::modified_jobs(docs, |d| self.snapshot_target(d, now))
    }

    /// Run a full sweep on the calling thread.
    pub fn tick(&self, docs: &mut DocumentSet) -> usize {
        let jobs = self.collect(docs, Local::now());
        let outcomes = run_jobs(jobs);
        apply_outcomes(docs, &outcomes)
    }

    /// Delete snapshot files older than the retention horizon.
    pub fn purge_expired(&self) -> io::Result<usize> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        purge_snapshots_before(&self.dir, cutoff)
    }
}

fn purge_snapshots_before(dir: &Path, cutoff: SystemTime) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_snapshot_name) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if modified < cutoff {
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Failed to purge {}: {}", entry.path().display(), e),
            }
        }
    }
    Ok(removed)
}

fn run_job(job: &AutosaveJob) -> io::Result<()> {
    match &job.target {
        AutosaveTarget::OriginalPath(path) => write_atomic(path, job.content.as_bytes()),
        AutosaveTarget::Snapshot(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_atomic(path, job.content.as_bytes())
        }
    }
}

/// Perform the writes. Failures are logged and reported, never raised;
/// the document stays modified and the next tick retries.
pub fn run_jobs(jobs: Vec<AutosaveJob>) -> Vec<AutosaveOutcome> {
    jobs.into_iter()
        .map(|job| {
            let succeeded = match run_job(&job) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Autosave of document {} failed: {}", job.doc.0, e);
                    false
                }
            };
            AutosaveOutcome {
                doc: job.doc,
                revision: job.revision,
                target: job.target,
                succeeded,
            }
        })
        .collect()
}

/// Clear modified flags for documents written back to their own file.
///
/// Returns how many documents became clean. A document edited after its job
/// was collected keeps its modified flag.
pub fn apply_outcomes(docs: &mut DocumentSet, outcomes: &[AutosaveOutcome]) -> usize {
    let mut cleaned = 0;
    for outcome in outcomes {
        if !outcome.succeeded {
            continue;
        }
        let AutosaveTarget::OriginalPath(path) = &outcome.target else {
            continue;
        };
        let Some(doc) = docs.doc_by_id_mut(outcome.doc) else {
            continue;
        };
        if doc.file_path() == Some(path.as_path()) && doc.mark_clean_at(outcome.revision) {
            cleaned += 1;
        }
    }
    cleaned
}

/// Background thread posting [`Message::AutosaveTick`] every interval.
pub struct AutosaveTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveTimer {
    pub fn start(interval: Duration, sender: Sender<Message>) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if sender.send(Message::AutosaveTick).is_err() {
                            break;
                        }
                    }
                    // Stop requested or the timer handle was dropped
                    _ => break,
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop the timer and wait for its thread. No tick is sent afterwards.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
