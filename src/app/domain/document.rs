use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::app::services::text_ops::{extract_filename, floor_char_boundary, line_and_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

const UTF8_BOM: &str = "\u{feff}";

/// One open text buffer and its save state.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    /// Stable identity used to name recovery snapshots.
    identity: Uuid,
    title: String,
    content: String,
    file_path: Option<PathBuf>,
    modified: bool,
    /// Bumped on every content mutation.
    revision: u64,
    caret: usize,
    selected: bool,
}

impl Document {
    pub fn new_untitled(id: DocumentId, counter: u32) -> Self {
        Self {
            id,
            identity: Uuid::new_v4(),
            title: format!("Untitled{}", counter),
            content: String::new(),
            file_path: None,
            modified: false,
            revision: 0,
            caret: 0,
            selected: false,
        }
    }

    /// Initialize a document from file bytes. Loading does not mark it modified.
    pub fn new_from_file(id: DocumentId, path: PathBuf, bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let content = text.strip_prefix(UTF8_BOM).unwrap_or(&text).to_string();

        Self {
            id,
            identity: Uuid::new_v4(),
            title: extract_filename(&path),
            content,
            file_path: Some(path),
            modified: false,
            revision: 0,
            caret: 0,
            selected: false,
        }
    }

    pub fn identity(&self) -> Uuid {
        self.identity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn display_title(&self) -> String {
        if self.modified {
            format!("{} *", self.title)
        } else {
            self.title.clone()
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Never saved: a save-as is needed before a plain save has a target.
    pub fn is_new_file(&self) -> bool {
        self.file_path.is_none()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// 1-based (line, column) of the caret.
    pub fn caret_position(&self) -> (usize, usize) {
        line_and_column(&self.content, self.caret)
    }

    /// Replace the whole buffer. Always marks the document modified.
    pub fn set_content(&mut self, text: impl Into<String>) {
        self.content = text.into();
        self.modified = true;
        self.revision += 1;
        self.caret = floor_char_boundary(&self.content, self.caret);
    }

    pub fn set_caret(&mut self, caret: usize) {
        self.caret = floor_char_boundary(&self.content, caret);
    }

    /// Record a successful save to `path`.
    pub fn mark_saved(&mut self, path: &Path) {
        self.file_path = Some(path.to_path_buf());
        self.title = extract_filename(path);
        self.modified = false;
    }

    /// Clear the modified flag only if no edit happened since `revision` was captured.
    pub fn mark_clean_at(&mut self, revision: u64) -> bool {
        if self.revision == revision {
            self.modified = false;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}
