//! Filegate Scan Library
//!
//! Client for a clamd-compatible malware scanner daemon. Speaks the
//! INSTREAM wire protocol (length-prefixed chunk framing over TCP) with
//! connect/scan timeouts, bounded retries with exponential backoff, and a
//! content-hash result cache.

pub mod cache;
pub mod client;
pub mod protocol;

// Re-export commonly used types
pub use cache::{content_hash, ScanCache};
pub use client::ScanClient;
pub use protocol::{ScanError, ScanVerdict};
