use crate::app::services::autosave::AutosaveOutcome;

/// Events delivered to the session's owner thread.
/// Background threads post these; the dispatch loop in main handles them.
#[derive(Debug, Clone)]
pub enum Message {
    /// The autosave interval elapsed
    AutosaveTick,
    /// A background autosave sweep finished writing
    AutosaveFinished(Vec<AutosaveOutcome>),
    /// A line of console input
    Input(String),
    /// Console input reached end of file
    InputClosed,
}
