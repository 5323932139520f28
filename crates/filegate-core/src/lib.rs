//! Filegate Core Library
//!
//! This crate provides the domain models, error types, configuration and
//! repository interface shared across all Filegate components: the
//! `FileRecord` lifecycle aggregate, its lifecycle events, and the
//! expected/actual object metadata types used during reconciliation.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;

// Re-export commonly used types
pub use config::{LifecyclePolicy, ScanConfig};
pub use error::AppError;
pub use repository::FileRepository;
