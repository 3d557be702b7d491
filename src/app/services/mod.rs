//! Services layer - business operations and utilities.
//!
//! This module contains business logic and operations:
//! - Find / replace
//! - Opening, saving and renaming files
//! - Autosave
//! - Settings persistence
//! - Text helpers

pub mod autosave;
pub mod files;
pub mod search;
pub mod settings_store;
pub mod text_ops;
