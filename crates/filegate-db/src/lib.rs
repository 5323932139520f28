//! Filegate Database Library
//!
//! Postgres-backed implementation of the persistence collaborator: the
//! `FileRepository` trait plus transaction utilities for multi-step atomic
//! updates. Schema lives in `migrations/`.

pub mod db;

pub use db::file::PgFileRepository;
pub use db::transaction::TransactionGuard;
