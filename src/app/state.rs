use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use chrono::Local;

use crate::app::controllers::tabs::DocumentSet;
use crate::app::domain::document::DocumentId;
use crate::app::domain::messages::Message;
use crate::app::domain::settings::{clamp_opacity, WindowGeometry};
use crate::app::infrastructure::error::{AppError, Result};
use crate::app::services::autosave::{
    apply_outcomes, run_jobs, AutosaveOutcome, AutosavePolicy, AutosaveTimer,
};
use crate::app::services::files::{read_document_bytes, rename_document, save_document};
use crate::app::services::search::{self, Highlight, MatchSpan, SearchQuery};
use crate::app::services::settings_store::SettingsStore;
use crate::ui::dialogs::{Dialogs, SaveChoice};

/// Lifecycle of the editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// Walking the modified documents asking save / discard / cancel
    ConfirmingClose,
    /// Terminal: autosave stopped, settings flushed
    Closed,
}

/// Contents of the find / replace panel.
#[derive(Debug, Clone, Default)]
pub struct FindState {
    pub find_text: String,
    pub replace_text: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl FindState {
    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(self.find_text.clone())
            .case_sensitive(self.case_sensitive)
            .whole_word(self.whole_word)
    }
}

/// Owns everything an editing session needs: documents, settings, autosave.
pub struct AppState {
    documents: DocumentSet,
    settings: SettingsStore,
    autosave: AutosavePolicy,
    timer: Option<AutosaveTimer>,
    autosave_worker: Option<JoinHandle<()>>,
    sender: Sender<Message>,
    state: SessionState,
    pub find: FindState,
    /// Span of the last match found, for painting the current highlight
    selection: Option<MatchSpan>,
    status: String,
}

impl AppState {
    pub fn new(settings: SettingsStore, autosave_dir: PathBuf, sender: Sender<Message>) -> Self {
        let autosave = AutosavePolicy::from_settings(autosave_dir, settings.get());
        let mut state = Self {
            documents: DocumentSet::new(),
            settings,
            autosave,
            timer: None,
            autosave_worker: None,
            sender,
            state: SessionState::Open,
            find: FindState::default(),
            selection: None,
            status: "Ready".to_string(),
        };
        state.restart_autosave_timer();
        state
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut DocumentSet {
        &mut self.documents
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn autosave(&self) -> &AutosavePolicy {
        &self.autosave
    }

    pub fn session_state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selection(&self) -> Option<MatchSpan> {
        self.selection
    }

    fn doc_title(&self, id: DocumentId) -> String {
        self.documents
            .doc_by_id(id)
            .map(|d| d.title().to_string())
            .unwrap_or_default()
    }

    fn missing(id: DocumentId) -> AppError {
        AppError::InvalidOperation(format!("no open document with id {}", id.0))
    }

    // --- Tabs ---

    pub fn new_tab(&mut self) -> DocumentId {
        self.selection = None;
        self.documents.add_untitled()
    }

    pub fn switch_to_document(&mut self, id: DocumentId) {
        self.selection = None;
        self.documents.set_active(id);
    }

    pub fn switch_to_next_tab(&mut self) {
        if let Some(id) = self.documents.next_doc_id() {
            self.switch_to_document(id);
        }
    }

    pub fn switch_to_previous_tab(&mut self) {
        if let Some(id) = self.documents.prev_doc_id() {
            self.switch_to_document(id);
        }
    }

    /// Replace the active document's text (an edit from the UI).
    pub fn edit_active(&mut self, text: impl Into<String>) {
        if let Some(doc) = self.documents.active_doc_mut() {
            doc.set_content(text);
        }
        self.selection = None;
    }

    pub fn move_caret(&mut self, caret: usize) {
        if let Some(doc) = self.documents.active_doc_mut() {
            doc.set_caret(caret);
        }
    }

    /// Close a tab, asking first if it has unsaved changes.
    /// Returns false when the user cancelled or the save did not happen.
    pub fn close_tab(&mut self, id: DocumentId, dialogs: &mut dyn Dialogs) -> Result<bool> {
        if !self.resolve_unsaved(id, dialogs)? {
            return Ok(false);
        }
        if self.documents.close(id).is_some() {
            self.selection = None;
            self.status = "Closed".to_string();
        }
        Ok(true)
    }

    /// Ask save / discard / cancel for a modified document.
    /// Ok(true) means the document may go away.
    fn resolve_unsaved(&mut self, id: DocumentId, dialogs: &mut dyn Dialogs) -> Result<bool> {
        let Some(doc) = self.documents.doc_by_id(id) else {
            return Ok(true);
        };
        if !doc.is_modified() {
            return Ok(true);
        }

        match dialogs.confirm_save(&doc.display_title()) {
            SaveChoice::Save => self.save(id, dialogs),
            SaveChoice::Discard => Ok(true),
            SaveChoice::Cancel => Ok(false),
        }
    }

    // --- File operations ---

    /// Open `path` in a new tab, or activate the tab that already shows it.
    pub fn open_file(&mut self, path: &Path) -> Result<DocumentId> {
        if let Some(existing) = self.documents.find_by_path(path) {
            self.switch_to_document(existing);
            return Ok(existing);
        }

        let bytes = read_document_bytes(path)?;
        let id = self.documents.add_from_file(path.to_path_buf(), &bytes);
        self.selection = None;
        self.status = format!("Opened: {}", path.display());
        Ok(id)
    }

    pub fn file_open(&mut self, dialogs: &mut dyn Dialogs) -> Result<Option<DocumentId>> {
        match dialogs.open_file() {
            Some(path) => self.open_file(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Save to the document's own path, or fall back to save-as.
    /// Ok(false) means the user dismissed the save dialog.
    pub fn save(&mut self, id: DocumentId, dialogs: &mut dyn Dialogs) -> Result<bool> {
        let path = self
            .documents
            .doc_by_id(id)
            .ok_or_else(|| Self::missing(id))?
            .file_path()
            .map(Path::to_path_buf);

        match path {
            Some(path) => {
                self.save_to(id, &path)?;
                Ok(true)
            }
            None => self.save_as(id, dialogs),
        }
    }

    pub fn save_as(&mut self, id: DocumentId, dialogs: &mut dyn Dialogs) -> Result<bool> {
        let suggested = self.doc_title(id);
        match dialogs.save_file(&suggested) {
            Some(path) => {
                self.save_to(id, &path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn save_to(&mut self, id: DocumentId, path: &Path) -> Result<()> {
        self.wait_for_autosave();
        let doc = self
            .documents
            .doc_by_id_mut(id)
            .ok_or_else(|| Self::missing(id))?;
        match save_document(doc, path) {
            Ok(()) => {
                self.status = format!("Saved: {}", path.display());
                Ok(())
            }
            Err(e) => {
                self.status = format!("Save failed: {}", e);
                Err(e)
            }
        }
    }

    /// Save every modified document; stops at the first failure.
    /// Returns how many documents were saved.
    pub fn save_all(&mut self, dialogs: &mut dyn Dialogs) -> Result<usize> {
        let mut saved = 0;
        for id in self.documents.modified_ids() {
            if self.save(id, dialogs)? {
                saved += 1;
            }
        }
        self.status = format!("Saved {} file(s)", saved);
        Ok(saved)
    }

    /// Ask for a new file name and rename the document's file in place.
    /// Ok(false) means the prompt was dismissed.
    pub fn rename(&mut self, id: DocumentId, dialogs: &mut dyn Dialogs) -> Result<bool> {
        let current = self
            .documents
            .doc_by_id(id)
            .ok_or_else(|| Self::missing(id))?
            .file_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                AppError::InvalidOperation(
                    "an unsaved document must be saved before renaming".to_string(),
                )
            })?;

        let current_name = self.doc_title(id);
        let Some(new_name) = dialogs.prompt_new_file_name(&current_name) else {
            return Ok(false);
        };
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(false);
        }

        let new_path = match current.parent() {
            Some(dir) => dir.join(new_name),
            None => PathBuf::from(new_name),
        };
        self.rename_to(id, &new_path)?;
        Ok(true)
    }

    pub fn rename_to(&mut self, id: DocumentId, new_path: &Path) -> Result<()> {
        self.wait_for_autosave();
        let doc = self
            .documents
            .doc_by_id_mut(id)
            .ok_or_else(|| Self::missing(id))?;
        rename_document(doc, new_path)?;
        self.status = format!("Renamed to: {}", doc.title());
        Ok(())
    }

    // --- Find / replace ---

    fn active_text_and_caret(&self) -> Option<(&str, usize)> {
        self.documents
            .active_doc()
            .map(|d| (d.content(), d.caret()))
    }

    fn select_match(&mut self, found: Option<MatchSpan>) -> Option<usize> {
        self.selection = found;
        match found {
            Some(m) => {
                if let Some(doc) = self.documents.active_doc_mut() {
                    doc.set_caret(m.start);
                }
                self.status = format!("Found at position {}", m.start + 1);
                Some(m.start)
            }
            None => {
                self.status = "No matches found".to_string();
                None
            }
        }
    }

    pub fn find_next(&mut self) -> Option<usize> {
        let query = self.find.query();
        let found = self
            .active_text_and_caret()
            .and_then(|(text, caret)| search::find_next_match(text, &query, caret));
        self.select_match(found)
    }

    pub fn find_previous(&mut self) -> Option<usize> {
        let query = self.find.query();
        let found = self
            .active_text_and_caret()
            .and_then(|(text, caret)| search::find_previous_match(text, &query, caret));
        self.select_match(found)
    }

    /// Replace the first match at or after the caret.
    pub fn replace(&mut self) -> bool {
        let query = self.find.query();
        let replacement = self.find.replace_text.clone();
        let replaced = self
            .active_text_and_caret()
            .and_then(|(text, caret)| search::replace_one(text, &query, &replacement, caret));

        self.selection = None;
        match (replaced, self.documents.active_doc_mut()) {
            (Some((text, caret)), Some(doc)) => {
                doc.set_content(text);
                doc.set_caret(caret);
                self.status = "Replaced".to_string();
                true
            }
            _ => {
                self.status = "No matches found".to_string();
                false
            }
        }
    }

    pub fn replace_all(&mut self) -> usize {
        let query = self.find.query();
        let replacement = self.find.replace_text.clone();
        let Some((text, _)) = self.active_text_and_caret() else {
            return 0;
        };
        let (text, count) = search::replace_all(text, &query, &replacement);

        self.selection = None;
        if count > 0 {
            if let Some(doc) = self.documents.active_doc_mut() {
                doc.set_content(text);
            }
            self.status = format!("Replaced {} occurrence(s)", count);
        } else {
            self.status = "No matches found".to_string();
        }
        count
    }

    /// Spans the renderer should paint for the current query.
    pub fn highlights(&self) -> Vec<Highlight> {
        match self.documents.active_doc() {
            Some(doc) => search::highlights(doc.content(), &self.find.query(), self.selection),
            None => Vec::new(),
        }
    }

    // --- Preferences ---

    pub fn toggle_theme(&mut self) -> bool {
        self.settings.update(|s| s.is_dark_theme = !s.is_dark_theme);
        self.settings.get().is_dark_theme
    }

    /// Stored for the front-end, which may or may not honor it.
    pub fn set_topmost_preference(&mut self, topmost: bool) {
        self.settings.update(|s| s.is_topmost = topmost);
    }

    pub fn set_window_opacity(&mut self, opacity: f64) -> f64 {
        let opacity = clamp_opacity(opacity);
        self.settings.update(|s| s.window_opacity = opacity);
        opacity
    }

    pub fn set_autosave_enabled(&mut self, enabled: bool) {
        self.settings.update(|s| s.is_auto_save_enabled = enabled);
        self.autosave.set_enabled(enabled);
        self.restart_autosave_timer();
    }

    pub fn set_autosave_interval(&mut self, secs: u32) {
        if secs == 0 {
            return;
        }
        self.settings.update(|s| s.auto_save_interval_seconds = secs);
        self.autosave.set_interval_secs(secs);
        self.restart_autosave_timer();
    }

    // --- Autosave ---

    fn restart_autosave_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        if self.autosave.is_enabled() && self.state != SessionState::Closed {
            self.timer = Some(AutosaveTimer::start(
                self.autosave.interval(),
                self.sender.clone(),
            ));
        }
    }

    pub fn autosave_in_flight(&self) -> bool {
        self.autosave_worker.is_some()
    }

    /// Block until a running background sweep has finished writing.
    ///
    /// Its `AutosaveFinished` message is still delivered and applied later;
    /// the revision guard keeps it from touching newer state.
    fn wait_for_autosave(&mut self) {
        if let Some(worker) = self.autosave_worker.take() {
            let _ = worker.join();
        }
    }

    /// Start a background sweep unless one is already running.
    pub fn on_autosave_tick(&mut self) {
        if self.state == SessionState::Closed || self.autosave_in_flight() {
            return;
        }
        let jobs = self.autosave.collect(&self.documents, Local::now());
        if jobs.is_empty() {
            return;
        }

        log::debug!("Autosaving {} document(s)", jobs.len());
        let sender = self.sender.clone();
        self.autosave_worker = Some(thread::spawn(move || {
            let outcomes = run_jobs(jobs);
            let _ = sender.send(Message::AutosaveFinished(outcomes));
        }));
    }

    pub fn on_autosave_finished(&mut self, outcomes: &[AutosaveOutcome]) {
        self.wait_for_autosave();
        let cleaned = apply_outcomes(&mut self.documents, outcomes);
        if cleaned > 0 {
            self.status = format!("Autosaved {} file(s)", cleaned);
        }
    }

    /// Write every modified document to a recovery snapshot on this thread.
    ///
    /// Used when nobody is left to answer prompts before exit. Works with
    /// autosave disabled and never overwrites the documents' own files.
    /// Returns how many snapshots were written.
    pub fn write_recovery_snapshots(&mut self) -> usize {
        self.wait_for_autosave();
        let jobs = self.autosave.collect_recovery(&self.documents, Local::now());
        let written = run_jobs(jobs).iter().filter(|o| o.succeeded).count();
        if written > 0 {
            log::info!(
                "Wrote {} recovery snapshot(s) to {}",
                written,
                self.autosave.dir().display()
            );
        }
        written
    }

    /// Maintenance: drop snapshot files past the retention horizon.
    pub fn purge_old_snapshots(&self) -> usize {
        match self.autosave.purge_expired() {
            Ok(removed) => removed,
            Err(e) => {
                log::warn!("Failed to purge autosave snapshots: {}", e);
                0
            }
        }
    }

    /// Handle background events. Console input is the front-end's business.
    pub fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::AutosaveTick => self.on_autosave_tick(),
            Message::AutosaveFinished(outcomes) => self.on_autosave_finished(&outcomes),
            Message::Input(_) | Message::InputClosed => {}
        }
    }

    // --- Shutdown ---

    /// Run the close protocol.
    ///
    /// Each modified document gets a save / discard / cancel prompt in tab
    /// order. Cancel, a dismissed save dialog, or a failed save returns the
    /// session to `Open` with nothing lost. Otherwise autosave is stopped,
    /// settings (with the final window geometry) are flushed and the session
    /// ends `Closed`.
    pub fn request_close(
        &mut self,
        geometry: Option<WindowGeometry>,
        dialogs: &mut dyn Dialogs,
    ) -> Result<SessionState> {
        if self.state == SessionState::Closed {
            return Ok(SessionState::Closed);
        }

        if self.documents.has_unsaved_changes() {
            self.state = SessionState::ConfirmingClose;
            for id in self.documents.modified_ids() {
                match self.resolve_unsaved(id, dialogs) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.state = SessionState::Open;
                        self.status = "Close cancelled".to_string();
                        return Ok(SessionState::Open);
                    }
                    Err(e) => {
                        self.state = SessionState::Open;
                        return Err(e);
                    }
                }
            }
        }

        self.finish_close(geometry);
        Ok(SessionState::Closed)
    }

    fn finish_close(&mut self, geometry: Option<WindowGeometry>) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.wait_for_autosave();
        match geometry {
            Some(g) => self.settings.update(|s| s.apply_geometry(g)),
            None => self.settings.flush(),
        }
        self.state = SessionState::Closed;
        log::info!("Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedDialogs {
        open_paths: VecDeque<Option<PathBuf>>,
        save_paths: VecDeque<Option<PathBuf>>,
        choices: VecDeque<SaveChoice>,
        names: VecDeque<Option<String>>,
        asked: Vec<String>,
    }

    impl Dialogs for ScriptedDialogs {
        fn open_file(&mut self) -> Option<PathBuf> {
            self.open_paths.pop_front().flatten()
        }

        fn save_file(&mut self, _suggested_name: &str) -> Option<PathBuf> {
            self.save_paths.pop_front().flatten()
        }

        fn confirm_save(&mut self, document_title: &str) -> SaveChoice {
            self.asked.push(document_title.to_string());
            self.choices.pop_front().unwrap_or(SaveChoice::Cancel)
        }

        fn prompt_new_file_name(&mut self, _current: &str) -> Option<String> {
            self.names.pop_front().flatten()
        }
    }

    struct Fixture {
        dir: TempDir,
        app: AppState,
        rx: Receiver<Message>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let settings = SettingsStore::load_from(dir.path().join("settings.json"));
        let (tx, rx) = mpsc::channel();
        let app = AppState::new(settings, dir.path().join("autosave"), tx);
        Fixture { dir, app, rx }
    }

    #[test]
    fn test_discard_on_close_leaves_fresh_document() {
        let mut f = fixture();
        let a = f.app.documents().active_id().unwrap();
        f.app.edit_active("hello");
        f.app.edit_active("hello world");
        assert!(f.app.documents().doc_by_id(a).unwrap().is_modified());

        let mut dialogs = ScriptedDialogs {
            choices: VecDeque::from([SaveChoice::Discard]),
            ..Default::default()
        };
        assert!(f.app.close_tab(a, &mut dialogs).unwrap());

        assert_eq!(f.app.documents().count(), 1);
        assert!(f.app.documents().doc_by_id(a).is_none());
        let fresh = f.app.documents().active_doc().unwrap();
        assert!(fresh.title().starts_with("Untitled"));
        assert!(!fresh.is_modified());
        assert_eq!(dialogs.asked, vec!["Untitled1 *".to_string()]);
    }

    #[test]
    fn test_cancel_on_close_keeps_document() {
        let mut f = fixture();
        let a = f.app.documents().active_id().unwrap();
        f.app.edit_active("keep me");
        let mut dialogs = ScriptedDialogs {
            choices: VecDeque::from([SaveChoice::Cancel]),
            ..Default::default()
        };
        assert!(!f.app.close_tab(a, &mut dialogs).unwrap());
        assert_eq!(f.app.documents().doc_by_id(a).unwrap().content(), "keep me");
    }

    #[test]
    fn test_save_on_close_uses_save_dialog_for_untitled() {
        let mut f = fixture();
        let target = f.dir.path().join("out.txt");
        let a = f.app.documents().active_id().unwrap();
        f.app.edit_active("saved text");
        let mut dialogs = ScriptedDialogs {
            choices: VecDeque::from([SaveChoice::Save]),
            save_paths: VecDeque::from([Some(target.clone())]),
            ..Default::default()
        };
        assert!(f.app.close_tab(a, &mut dialogs).unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "saved text");
    }

    #[test]
    fn test_open_file_and_dedup() {
        let mut f = fixture();
        let path = f.dir.path().join("a.txt");
        fs::write(&path, "alpha").unwrap();

        let id = f.app.open_file(&path).unwrap();
        assert_eq!(f.app.documents().count(), 2);
        assert_eq!(f.app.documents().active_id(), Some(id));
        assert!(!f.app.documents().doc_by_id(id).unwrap().is_modified());

        f.app.switch_to_next_tab();
        assert_ne!(f.app.documents().active_id(), Some(id));
        assert_eq!(f.app.open_file(&path).unwrap(), id);
        assert_eq!(f.app.documents().count(), 2);
        assert_eq!(f.app.documents().active_id(), Some(id));
    }

    #[test]
    fn test_open_missing_file_creates_nothing() {
        let mut f = fixture();
        let err = f.app.open_file(&f.dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(f.app.documents().count(), 1);
    }

    #[test]
    fn test_file_open_dialog_dismissed() {
        let mut f = fixture();
        let mut dialogs = ScriptedDialogs::default();
        assert_eq!(f.app.file_open(&mut dialogs).unwrap(), None);
    }

    #[test]
    fn test_failed_save_surfaces_error_and_keeps_state() {
        let mut f = fixture();
        let a = f.app.documents().active_id().unwrap();
        f.app.edit_active("text");
        let bad = f.dir.path().join("nope").join("x.txt");
        assert!(f.app.save_to(a, &bad).is_err());
        let doc = f.app.documents().doc_by_id(a).unwrap();
        assert!(doc.is_modified());
        assert!(doc.is_new_file());
        assert!(f.app.status().starts_with("Save failed"));
    }

    #[test]
    fn test_save_all() {
        let mut f = fixture();
        let path = f.dir.path().join("b.txt");
        fs::write(&path, "").unwrap();
        let b = f.app.open_file(&path).unwrap();
        f.app.edit_active("bee");
        f.app.switch_to_document(f.app.documents().prev_doc_id().unwrap());
        f.app.edit_active("untitled text");

        let mut dialogs = ScriptedDialogs {
            save_paths: VecDeque::from([Some(f.dir.path().join("u.txt"))]),
            ..Default::default()
        };
        assert_eq!(f.app.save_all(&mut dialogs).unwrap(), 2);
        assert!(!f.app.documents().has_unsaved_changes());
        assert_eq!(fs::read_to_string(&path).unwrap(), "bee");
        assert_eq!(f.app.documents().doc_by_id(b).unwrap().title(), "b.txt");
    }

    #[test]
    fn test_rename_flushes_modified_content_first() {
        let mut f = fixture();
        let old = f.dir.path().join("note.txt");
        fs::write(&old, "original").unwrap();
        let id = f.app.open_file(&old).unwrap();
        f.app.edit_active("edited");

        let mut dialogs = ScriptedDialogs {
            names: VecDeque::from([Some("note2.txt".to_string())]),
            ..Default::default()
        };
        assert!(f.app.rename(id, &mut dialogs).unwrap());

        let new = f.dir.path().join("note2.txt");
        let doc = f.app.documents().doc_by_id(id).unwrap();
        assert_eq!(doc.file_path(), Some(new.as_path()));
        assert!(!doc.is_modified());
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).unwrap(), "edited");
    }

    #[test]
    fn test_rename_untitled_is_invalid() {
        let mut f = fixture();
        let a = f.app.documents().active_id().unwrap();
        let mut dialogs = ScriptedDialogs::default();
        let err = f.app.rename(a, &mut dialogs).unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));
    }

    #[test]
    fn test_find_and_replace_flow() {
        let mut f = fixture();
        f.app.edit_active("cat dog cat");
        f.app.find.find_text = "cat".to_string();
        f.app.find.replace_text = "fox".to_string();

        assert_eq!(f.app.find_next(), Some(8));
        assert_eq!(f.app.selection(), Some(MatchSpan { start: 8, len: 3 }));
        let hl = f.app.highlights();
        assert_eq!(hl.len(), 2);
        assert!(hl[1].current);

        assert_eq!(f.app.find_previous(), Some(0));
        assert!(f.app.replace());
        assert_eq!(f.app.documents().active_doc().unwrap().content(), "fox dog cat");
        assert_eq!(f.app.documents().active_doc().unwrap().caret(), 3);

        assert_eq!(f.app.replace_all(), 1);
        assert_eq!(f.app.documents().active_doc().unwrap().content(), "fox dog fox");
        assert_eq!(f.app.replace_all(), 0);
        assert_eq!(f.app.status(), "No matches found");
    }

    #[test]
    fn test_preferences_persist() {
        let mut f = fixture();
        assert!(f.app.toggle_theme());
        f.app.set_topmost_preference(true);
        assert_eq!(f.app.set_window_opacity(0.1), 0.3);

        let reloaded = SettingsStore::load_from(f.dir.path().join("settings.json"));
        assert!(reloaded.get().is_dark_theme);
        assert!(reloaded.get().is_topmost);
        assert_eq!(reloaded.get().window_opacity, 0.3);
    }

    #[test]
    fn test_background_autosave_round_trip() {
        let mut f = fixture();
        let path = f.dir.path().join("auto.txt");
        fs::write(&path, "v0").unwrap();
        let id = f.app.open_file(&path).unwrap();
        f.app.edit_active("v1");

        f.app.on_autosave_tick();
        assert!(f.app.autosave_in_flight());
        // A second tick while writing is ignored
        f.app.on_autosave_tick();

        let msg = recv_autosave_finished(&f.rx);
        f.app.handle_message(msg);

        assert!(!f.app.autosave_in_flight());
        assert!(!f.app.documents().doc_by_id(id).unwrap().is_modified());
        assert_eq!(fs::read_to_string(&path).unwrap(), "v1");
    }

    fn recv_autosave_finished(rx: &Receiver<Message>) -> Message {
        loop {
            let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if matches!(msg, Message::AutosaveFinished(_)) {
                return msg;
            }
        }
    }

    #[test]
    fn test_user_save_is_not_overwritten_by_pending_autosave() {
        let mut f = fixture();
        let path = f.dir.path().join("race.txt");
        fs::write(&path, "v0").unwrap();
        let id = f.app.open_file(&path).unwrap();

        f.app.edit_active("v1");
        f.app.on_autosave_tick();
        assert!(f.app.autosave_in_flight());
        f.app.edit_active("v2");
        let mut dialogs = ScriptedDialogs::default();
        assert!(f.app.save(id, &mut dialogs).unwrap());
        assert!(!f.app.autosave_in_flight());

        let msg = recv_autosave_finished(&f.rx);
        f.app.handle_message(msg);

        let doc = f.app.documents().doc_by_id(id).unwrap();
        assert_eq!(doc.content(), "v2");
        assert!(!doc.is_modified());
        assert_eq!(fs::read_to_string(&path).unwrap(), "v2");
    }

    #[test]
    fn test_rename_waits_for_pending_autosave() {
        let mut f = fixture();
        let old = f.dir.path().join("before.txt");
        fs::write(&old, "v0").unwrap();
        let id = f.app.open_file(&old).unwrap();

        f.app.edit_active("v1");
        f.app.on_autosave_tick();
        let new = f.dir.path().join("after.txt");
        f.app.rename_to(id, &new).unwrap();

        let msg = recv_autosave_finished(&f.rx);
        f.app.handle_message(msg);

        assert!(!old.exists());
        assert_eq!(fs::read_to_string(&new).unwrap(), "v1");
        assert!(!f.app.documents().doc_by_id(id).unwrap().is_modified());
    }

    #[test]
    fn test_recovery_snapshots_with_autosave_disabled() {
        let mut f = fixture();
        f.app.set_autosave_enabled(false);
        let path = f.dir.path().join("kept.txt");
        fs::write(&path, "on disk").unwrap();
        f.app.edit_active("scratch");
        f.app.open_file(&path).unwrap();
        f.app.edit_active("edited");

        assert_eq!(f.app.write_recovery_snapshots(), 2);

        let snapshots: Vec<_> = fs::read_dir(f.dir.path().join("autosave"))
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "on disk");
        assert!(f.app.documents().has_unsaved_changes());
    }

    #[test]
    fn test_close_without_changes_goes_straight_to_closed() {
        let mut f = fixture();
        let mut dialogs = ScriptedDialogs::default();
        let geometry = WindowGeometry {
            width: 1024.0,
            height: 768.0,
            left: 12.0,
            top: 34.0,
        };
        let state = f.app.request_close(Some(geometry), &mut dialogs).unwrap();
        assert_eq!(state, SessionState::Closed);
        assert!(dialogs.asked.is_empty());

        let reloaded = SettingsStore::load_from(f.dir.path().join("settings.json"));
        assert_eq!(reloaded.get().window_width, 1024.0);
        assert_eq!(reloaded.get().window_top, 34.0);
    }

    #[test]
    fn test_close_cancel_returns_to_open() {
        let mut f = fixture();
        f.app.edit_active("one");
        f.app.new_tab();
        f.app.edit_active("two");

        let mut dialogs = ScriptedDialogs {
            choices: VecDeque::from([SaveChoice::Discard, SaveChoice::Cancel]),
            ..Default::default()
        };
        let state = f.app.request_close(None, &mut dialogs).unwrap();
        assert_eq!(state, SessionState::Open);
        assert_eq!(f.app.session_state(), SessionState::Open);
        assert_eq!(dialogs.asked.len(), 2);
        assert!(f.app.documents().has_unsaved_changes());
        assert_eq!(f.app.documents().count(), 2);
    }

    #[test]
    fn test_close_with_dismissed_save_dialog_aborts() {
        let mut f = fixture();
        f.app.edit_active("draft");
        let mut dialogs = ScriptedDialogs {
            choices: VecDeque::from([SaveChoice::Save]),
            save_paths: VecDeque::from([None]),
            ..Default::default()
        };
        assert_eq!(f.app.request_close(None, &mut dialogs).unwrap(), SessionState::Open);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut f = fixture();
        f.app.edit_active("unsaved");
        let mut dialogs = ScriptedDialogs {
            choices: VecDeque::from([SaveChoice::Discard]),
            ..Default::default()
        };
        assert_eq!(f.app.request_close(None, &mut dialogs).unwrap(), SessionState::Closed);

        f.app.on_autosave_tick();
        assert!(!f.app.autosave_in_flight());
        assert_eq!(f.app.request_close(None, &mut dialogs).unwrap(), SessionState::Closed);
        assert_eq!(dialogs.asked.len(), 1);
    }
}
