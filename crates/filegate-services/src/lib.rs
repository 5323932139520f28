//! Filegate Services Library
//!
//! Business services on top of the lifecycle core: the reconciler that
//! validates upload notifications against expected records, the scanner
//! seam, the event publisher seam, and the orchestrating file service.

pub mod events;
pub mod file_service;
pub mod reconciler;
pub mod scanner;

// Re-export commonly used types
pub use events::{EventPublisher, TracingPublisher};
pub use file_service::{FileService, NewUpload};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use scanner::MalwareScanner;
