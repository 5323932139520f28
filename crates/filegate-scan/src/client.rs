//! Malware scan client
//!
//! One fresh TCP connection per call, no pooling: scanning is not a hot
//! path and a pool would only add failure modes. Two timeouts apply to a
//! scan attempt at once: the connect timeout bounds the TCP handshake, the
//! scan timeout bounds framing plus the response read. Failed attempts are
//! retried with exponential backoff up to the configured bound and the
//! final failure carries the last underlying error; a scan that cannot
//! complete is never reported as clean.

use std::time::Duration;

use filegate_core::config::ScanConfig;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::cache::{content_hash, ScanCache};
use crate::protocol::{
    self, ScanError, ScanVerdict, MAX_RESPONSE_SIZE, PING_COMMAND, THREAT_FILE_TOO_LARGE,
};

/// Client for a clamd-compatible scanner daemon.
pub struct ScanClient {
    config: ScanConfig,
    cache: Option<ScanCache>,
}

impl ScanClient {
    pub fn new(config: ScanConfig) -> Self {
        let cache = config.cache_enabled.then(|| {
            ScanCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            )
        });
        ScanClient { config, cache }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    async fn connect(&self) -> Result<TcpStream, ScanError> {
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        match tokio::time::timeout(connect_timeout, TcpStream::connect(self.address())).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ScanError::Connection(format!("{}: {}", self.address(), e))),
            Err(_) => Err(ScanError::Timeout(connect_timeout)),
        }
    }

    /// Health probe: `zPING\0` on a fresh connection, healthy iff the
    /// response contains `PONG`. Never errors.
    pub async fn ping(&self) -> bool {
        match self.ping_inner().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::debug!(address = %self.address(), error = %e, "Scanner ping failed");
                false
            }
        }
    }

    async fn ping_inner(&self) -> Result<bool, ScanError> {
        let mut stream = self.connect().await?;
        let io_timeout = Duration::from_secs(self.config.scan_timeout_secs);
        let exchange = async {
            stream.write_all(PING_COMMAND).await?;
            stream.flush().await?;
            let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
            let n = stream.read(&mut buf).await?;
            Ok::<_, ScanError>(protocol::is_pong(&buf[..n]))
        };
        match tokio::time::timeout(io_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(io_timeout)),
        }
    }

    /// Scan a payload against the daemon.
    ///
    /// Oversized payloads are refused without any network call, reported as
    /// an infected verdict naming [`THREAT_FILE_TOO_LARGE`]. With caching
    /// enabled, byte-identical content resolves from the cache without
    /// contacting the daemon. Cancellation aborts the current attempt
    /// immediately (the connection is dropped, no further chunks are
    /// written) and is never retried.
    pub async fn scan(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ScanVerdict, ScanError> {
        if self.config.max_file_size_bytes > 0
            && data.len() as u64 > self.config.max_file_size_bytes
        {
            tracing::warn!(
                declared_size = data.len(),
                max_size = self.config.max_file_size_bytes,
                "Payload exceeds scanner size limit, refusing without scan"
            );
            return Ok(ScanVerdict::infected(THREAT_FILE_TOO_LARGE)
                .with_detail("declared_size", data.len().to_string()));
        }

        let hash = self.cache.as_ref().map(|_| content_hash(data));
        if let (Some(cache), Some(hash)) = (&self.cache, &hash) {
            if let Some(verdict) = cache.get(hash) {
                tracing::debug!(content_hash = %hash, "Scan cache hit");
                return Ok(verdict.with_detail("cache", "hit".to_string()));
            }
        }

        let mut failures: u32 = 0;
        loop {
            match self.scan_attempt(data, cancel).await {
                Ok(verdict) => {
                    if let (Some(cache), Some(hash)) = (&self.cache, hash) {
                        cache.insert(hash, verdict.clone());
                    }
                    tracing::info!(
                        clean = verdict.clean,
                        threat = verdict.threat.as_deref().unwrap_or(""),
                        attempts = failures + 1,
                        "Scan completed"
                    );
                    return Ok(verdict.with_detail("attempts", (failures + 1).to_string()));
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    failures += 1;
                    if failures > self.config.max_retries {
                        tracing::error!(
                            attempts = failures,
                            error = %e,
                            "Scan failed after exhausting retries"
                        );
                        return Err(ScanError::RetriesExhausted {
                            attempts: failures,
                            source: Box::new(e),
                        });
                    }
                    // 2^attempt seconds with attempts counted from zero:
                    // the first retry waits 2^0 = 1s, then 2s, 4s, ...
                    let backoff = Duration::from_secs(1u64 << (failures - 1).min(16));
                    tracing::warn!(
                        attempt = failures,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Scan attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    /// One connect-stream-read exchange. Dropping the in-flight future on
    /// cancellation closes the socket instead of attempting a graceful
    /// shutdown.
    async fn scan_attempt(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ScanVerdict, ScanError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            result = self.exchange(data) => result,
        }
    }

    async fn exchange(&self, data: &[u8]) -> Result<ScanVerdict, ScanError> {
        let mut stream = self.connect().await?;
        let scan_timeout = Duration::from_secs(self.config.scan_timeout_secs);
        let framed_read = async {
            protocol::write_instream(&mut stream, data).await?;
            let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(ScanError::Protocol(
                    "scanner closed connection without a response".to_string(),
                ));
            }
            protocol::parse_scan_response(&buf[..n])
        };
        match tokio::time::timeout(scan_timeout, framed_read).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(scan_timeout)),
        }
    }
}
