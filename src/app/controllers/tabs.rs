use std::path::{Path, PathBuf};

use crate::app::domain::document::{Document, DocumentId};

/// Ordered set of open documents (tab order) plus the active selection.
///
/// Once constructed the set is never empty: closing the last document
/// replaces it with a fresh untitled one.
pub struct DocumentSet {
    documents: Vec<Document>,
    active_id: Option<DocumentId>,
    next_id: u64,
    untitled_counter: u32,
}

impl Default for DocumentSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSet {
    pub fn new() -> Self {
        let mut set = Self {
            documents: Vec::new(),
            active_id: None,
            next_id: 1,
            untitled_counter: 0,
        };
        set.add_untitled();
        set
    }

    fn next_document_id(&mut self) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push_and_activate(&mut self, doc: Document) -> DocumentId {
        let id = doc.id;
        self.documents.push(doc);
        self.set_active(id);
        id
    }

    /// Open a new "UntitledN" tab and make it active.
    pub fn add_untitled(&mut self) -> DocumentId {
        self.untitled_counter += 1;
        let id = self.next_document_id();
        let doc = Document::new_untitled(id, self.untitled_counter);
        self.push_and_activate(doc)
    }

    /// Open a tab initialized from file bytes and make it active.
    pub fn add_from_file(&mut self, path: PathBuf, bytes: &[u8]) -> DocumentId {
        let id = self.next_document_id();
        let doc = Document::new_from_file(id, path, bytes);
        self.push_and_activate(doc)
    }

    pub fn active_doc(&self) -> Option<&Document> {
        let active_id = self.active_id?;
        self.doc_by_id(active_id)
    }

    pub fn active_doc_mut(&mut self) -> Option<&mut Document> {
        let active_id = self.active_id?;
        self.doc_by_id_mut(active_id)
    }

    pub fn set_active(&mut self, id: DocumentId) {
        if !self.documents.iter().any(|d| d.id == id) {
            return;
        }
        self.active_id = Some(id);
        for doc in &mut self.documents {
            doc.set_selected(doc.id == id);
        }
    }

    /// Remove a document. Returns it if it was present.
    ///
    /// If the active document is removed the last tab becomes active; if the
    /// set becomes empty a fresh untitled document takes its place.
    pub fn close(&mut self, id: DocumentId) -> Option<Document> {
        let idx = self.documents.iter().position(|d| d.id == id)?;
        let mut doc = self.documents.remove(idx);
        doc.set_selected(false);

        if self.documents.is_empty() {
            self.active_id = None;
            self.add_untitled();
        } else if self.active_id == Some(id) {
            let last = self.documents[self.documents.len() - 1].id;
            self.set_active(last);
        }

        Some(doc)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn count(&self) -> usize {
        self.documents.len()
    }

    pub fn active_id(&self) -> Option<DocumentId> {
        self.active_id
    }

    /// Find a document by file path
    pub fn find_by_path(&self, path: &Path) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|d| d.file_path() == Some(path))
            .map(|d| d.id)
    }

    pub fn doc_by_id(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn doc_by_id_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.documents.iter().any(|d| d.is_modified())
    }

    /// Ids of modified documents, in tab order.
    pub fn modified_ids(&self) -> Vec<DocumentId> {
        self.documents
            .iter()
            .filter(|d| d.is_modified())
            .map(|d| d.id)
            .collect()
    }

    /// Get the next document id (for tab cycling)
    pub fn next_doc_id(&self) -> Option<DocumentId> {
        let active_id = self.active_id?;
        let idx = self.documents.iter().position(|d| d.id == active_id)?;
        let next_idx = (idx + 1) % self.documents.len();
        Some(self.documents[next_idx].id)
    }

    /// Get the previous document id (for tab cycling)
    pub fn prev_doc_id(&self) -> Option<DocumentId> {
        let active_id = self.active_id?;
        let idx = self.documents.iter().position(|d| d.id == active_id)?;
        let prev_idx = if idx == 0 {
            self.documents.len() - 1
        } else {
            idx - 1
        };
        Some(self.documents[prev_idx].id)
    }
}
