//! Application layer - organized by Clean Architecture principles.
//!
//! # Structure
//!
//! - `domain/` - Core data structures (Document, Settings, Messages)
//! - `controllers/` - Orchestration (DocumentSet)
//! - `services/` - Business operations (search, files, autosave, settings store)
//! - `infrastructure/` - External integrations (atomic writes, paths, error)
//! - `state.rs` - Main session coordinator

pub mod controllers;
pub mod domain;
pub mod infrastructure;
pub mod services;
pub mod state;

// Re-exports for convenient external access
pub use controllers::tabs::DocumentSet;
pub use domain::{AppSettings, Document, DocumentId, Message, WindowGeometry};
pub use infrastructure::error::{AppError, Result};
pub use services::search::{Highlight, MatchSpan, SearchQuery};
pub use services::settings_store::SettingsStore;
pub use state::{AppState, FindState, SessionState};
