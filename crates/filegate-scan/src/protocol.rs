//! Scan daemon wire protocol
//!
//! Framing and response parsing for the clamd streaming protocol, kept
//! bit-exact for interoperability with the reference daemon:
//!
//! - commands are ASCII with a `z` prefix and NUL terminator
//!   (`zINSTREAM\0`, `zPING\0`), one fresh TCP connection per call;
//! - payloads stream in chunks of at most 8192 bytes, each preceded by a
//!   4-byte big-endian unsigned length, terminated by a zero-length chunk;
//! - the response is a single buffer of at most 2048 bytes, ASCII, with
//!   trailing NULs trimmed.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Maximum payload bytes per INSTREAM chunk.
pub const CHUNK_SIZE: usize = 8192;
/// Maximum response bytes read back from the daemon.
pub const MAX_RESPONSE_SIZE: usize = 2048;

pub const INSTREAM_COMMAND: &[u8] = b"zINSTREAM\0";
pub const PING_COMMAND: &[u8] = b"zPING\0";

/// Threat name reported when the payload exceeds the configured size gate.
pub const THREAT_FILE_TOO_LARGE: &str = "FILE_TOO_LARGE";
/// Threat name reported when the daemon flags a stream without naming it.
pub const THREAT_UNKNOWN: &str = "UNKNOWN_THREAT";

/// Outcome of a malware scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub clean: bool,
    pub threat: Option<String>,
    /// Ordered diagnostic pairs (raw response, attempt count, ...). Never
    /// interpreted, only logged.
    pub details: Vec<(String, String)>,
}

impl ScanVerdict {
    pub fn clean() -> Self {
        ScanVerdict {
            clean: true,
            threat: None,
            details: Vec::new(),
        }
    }

    pub fn infected(threat: impl Into<String>) -> Self {
        ScanVerdict {
            clean: false,
            threat: Some(threat.into()),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }
}

/// Scan client errors.
///
/// `Timeout`, `Protocol` and `Connection` are transient for a single
/// attempt and eligible for retry; `Cancelled` aborts immediately;
/// `RetriesExhausted` is the fatal wrapper carrying the last underlying
/// error once the retry budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan cancelled")]
    Cancelled,

    #[error("scanner connection failed: {0}")]
    Connection(String),

    #[error("scan timed out after {0:?}")]
    Timeout(Duration),

    #[error("scanner protocol error: {0}")]
    Protocol(String),

    #[error("scanner IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scan failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ScanError>,
    },
}

impl ScanError {
    /// Cancellation is the only error that must not be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ScanError::Cancelled)
    }
}

/// Encode one chunk as `[u32 big-endian length][payload]`.
pub fn encode_chunk(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Decode one chunk frame, returning the payload and the total frame
/// length consumed. Fails if the buffer is shorter than the declared
/// length.
pub fn decode_chunk(frame: &[u8]) -> Result<(&[u8], usize), ScanError> {
    if frame.len() < 4 {
        return Err(ScanError::Protocol("chunk frame shorter than length prefix".to_string()));
    }
    let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let total = 4 + declared;
    if frame.len() < total {
        return Err(ScanError::Protocol(format!(
            "chunk declares {} bytes but only {} present",
            declared,
            frame.len() - 4
        )));
    }
    Ok((&frame[4..total], total))
}

/// Stream `data` to the writer in INSTREAM framing: the command, then
/// chunks of at most [`CHUNK_SIZE`] bytes, then the zero-length terminator,
/// then a flush.
pub async fn write_instream<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ScanError> {
    writer.write_all(INSTREAM_COMMAND).await?;
    for chunk in data.chunks(CHUNK_SIZE) {
        writer.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
        writer.write_all(chunk).await?;
    }
    writer.write_all(&0u32.to_be_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Interpret a raw daemon response buffer as a scan verdict.
///
/// `FOUND` (case-insensitive) wins over `OK`: an infected response names
/// the stream and the threat, e.g. `stream: Eicar-Test-Signature FOUND`.
/// The threat name is the text between the first `:` and the `FOUND`
/// marker; a response with no colon reports [`THREAT_UNKNOWN`].
pub fn parse_scan_response(raw: &[u8]) -> Result<ScanVerdict, ScanError> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches('\0').trim();
    let upper = text.to_ascii_uppercase();

    if let Some(found_idx) = upper.find("FOUND") {
        let threat = match text.find(':') {
            Some(colon_idx) if colon_idx + 1 < found_idx => {
                let name = text[colon_idx + 1..found_idx].trim();
                if name.is_empty() {
                    THREAT_UNKNOWN.to_string()
                } else {
                    name.to_string()
                }
            }
            _ => THREAT_UNKNOWN.to_string(),
        };
        return Ok(ScanVerdict::infected(threat).with_detail("raw_response", text));
    }

    if upper.contains("OK") {
        return Ok(ScanVerdict::clean().with_detail("raw_response", text));
    }

    Err(ScanError::Protocol(format!(
        "unrecognized scanner response: {:?}",
        text
    )))
}

/// Whether a raw ping response indicates a healthy daemon.
pub fn is_pong(raw: &[u8]) -> bool {
    String::from_utf8_lossy(raw).to_ascii_uppercase().contains("PONG")
}
