//! Filegate Storage Library
//!
//! Storage abstraction consumed by the file lifecycle core, plus a local
//! filesystem backend used by tests and single-node deployments.
//!
//! Storage keys are derived once from `path` and `file_name` by
//! `filegate_core::models::derive_storage_key` and never reinterpreted
//! here; keys must not contain `..` or a leading `/`.

pub mod local;
pub mod traits;

// Re-export commonly used types
pub use local::LocalStorage;
pub use traits::{BatchRemoveFailure, Storage, StorageBackend, StorageError, StorageResult};
