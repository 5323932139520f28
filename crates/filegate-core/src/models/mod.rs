//! Data models for the file lifecycle
//!
//! This module contains the `FileRecord` aggregate with its status state
//! machine, the lifecycle events emitted by transitions, and the object
//! metadata types compared during reconciliation.

mod event;
mod file;
mod metadata;

// Re-export all models for convenient imports
pub use event::*;
pub use file::*;
pub use metadata::*;
