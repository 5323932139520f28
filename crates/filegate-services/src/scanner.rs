//! Scanner seam for the orchestrator
//!
//! The file service depends on this trait rather than the concrete TCP
//! client, so tests and alternative scanner integrations can slot in.

use async_trait::async_trait;
use filegate_scan::{ScanClient, ScanError, ScanVerdict};
use tokio_util::sync::CancellationToken;

/// A malware scanner for in-memory payloads.
#[async_trait]
pub trait MalwareScanner: Send + Sync {
    async fn scan(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ScanVerdict, ScanError>;
}

#[async_trait]
impl MalwareScanner for ScanClient {
    async fn scan(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ScanVerdict, ScanError> {
        ScanClient::scan(self, data, cancel).await
    }
}
