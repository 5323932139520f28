//! Configuration module
//!
//! Env-variable driven configuration for the lifecycle policy and the scan
//! client. Values come from the process environment with sensible defaults;
//! a `.env` file is honored when present.

use std::env;
use std::str::FromStr;

const DEFAULT_CLAMD_PORT: u16 = 3310;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_CAPACITY: usize = 1024;

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Which lifecycle gates are active for new uploads.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// Compare storage-observed metadata against the record on
    /// notification.
    pub validation_enabled: bool,
    /// Run the malware scan after validation.
    pub scanning_enabled: bool,
    /// Maximum accepted object size in bytes during validation; 0 means no
    /// limit.
    pub max_file_size_bytes: i64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        LifecyclePolicy {
            validation_enabled: true,
            scanning_enabled: false,
            max_file_size_bytes: 0,
        }
    }
}

impl LifecyclePolicy {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        LifecyclePolicy {
            validation_enabled: env_bool("FILEGATE_VALIDATION_ENABLED", true),
            scanning_enabled: env_bool("FILEGATE_SCANNING_ENABLED", false),
            max_file_size_bytes: env_parse("FILEGATE_MAX_FILE_SIZE_BYTES", 0),
        }
    }
}

/// Scan daemon client configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Scanner daemon hostname.
    pub host: String,
    /// Scanner daemon port (clamd convention: 3310).
    pub port: u16,
    /// Bounds the TCP handshake only.
    pub connect_timeout_secs: u64,
    /// Bounds framing plus response read for one attempt.
    pub scan_timeout_secs: u64,
    /// Payloads larger than this are refused without contacting the
    /// daemon; 0 means unlimited.
    pub max_file_size_bytes: u64,
    /// Additional attempts after the initial one.
    pub max_retries: u32,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            host: "localhost".to_string(),
            port: DEFAULT_CLAMD_PORT,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            max_file_size_bytes: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            cache_enabled: true,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ScanConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        ScanConfig {
            host: env_or("FILEGATE_CLAMD_HOST", "localhost"),
            port: env_parse("FILEGATE_CLAMD_PORT", DEFAULT_CLAMD_PORT),
            connect_timeout_secs: env_parse(
                "FILEGATE_SCAN_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
            scan_timeout_secs: env_parse("FILEGATE_SCAN_TIMEOUT_SECS", DEFAULT_SCAN_TIMEOUT_SECS),
            max_file_size_bytes: env_parse("FILEGATE_SCAN_MAX_FILE_SIZE_BYTES", 0),
            max_retries: env_parse("FILEGATE_SCAN_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            cache_enabled: env_bool("FILEGATE_SCAN_CACHE_ENABLED", true),
            cache_ttl_secs: env_parse("FILEGATE_SCAN_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
            cache_capacity: env_parse("FILEGATE_SCAN_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
        }
    }
}
