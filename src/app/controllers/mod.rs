//! Controllers layer - orchestration of the open documents.
//!
//! - Tab (document set) management

pub mod tabs;
