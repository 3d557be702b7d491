use std::path::PathBuf;

/// Answer to "save changes to X?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveChoice {
    Save,
    Discard,
    Cancel,
}

/// User prompts the session needs. The front-end decides how to present them;
/// the session only consumes the answers.
pub trait Dialogs {
    fn open_file(&mut self) -> Option<PathBuf>;

    fn save_file(&mut self, suggested_name: &str) -> Option<PathBuf>;

    fn confirm_save(&mut self, document_title: &str) -> SaveChoice;

    fn prompt_new_file_name(&mut self, current: &str) -> Option<String>;
}
