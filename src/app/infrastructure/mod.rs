//! Infrastructure layer - external integrations and utilities.
//!
//! This module contains code that interfaces with the filesystem and platform:
//! - Atomic file writes
//! - Platform config/data directories
//! - Error types

pub mod atomic_write;
pub mod error;
pub mod paths;
