// src/config.rs
use secrecy::SecretString;
use std::time::Duration;

use crate::errors::{Result, ScanError};
use crate::models::MAX_FILE_SIZE;
use crate::poller::PollConfig;

pub const DEFAULT_API_BASE: &str = "https://www.virustotal.com/api/v3";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connection details for the VirusTotal v3 API.
#[derive(Debug, Clone)]
pub struct VirusTotalConfig {
    pub api_base: String,
    /// Sent as `x-apikey` on every outbound call. Never logged.
    pub api_key: SecretString,
}

impl VirusTotalConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

/// High-level application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub virustotal: VirusTotalConfig,
    pub bind_addr: String,
    pub request_timeout: Duration,
    /// Uploads are cut off once this many bytes have been streamed.
    pub max_upload_bytes: u64,
    pub poll: PollConfig,
}

impl AppConfig {
    /// Configuration with defaults for everything but the credential.
    pub fn new(virustotal: VirusTotalConfig) -> Self {
        Self {
            virustotal,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_bytes: MAX_FILE_SIZE,
            poll: PollConfig::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("VIRUSTOTAL_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ScanError::Config("VIRUSTOTAL_KEY must be set to a VirusTotal API key".to_string())
            })?;

        let mut virustotal = VirusTotalConfig::new(api_key);
        if let Some(api_base) = lookup("VIRUSTOTAL_API_BASE") {
            virustotal = virustotal.with_api_base(api_base.trim_end_matches('/'));
        }

        let mut config = AppConfig::new(virustotal);

        if let Some(bind_addr) = lookup("SCANRELAY_BIND") {
            config.bind_addr = bind_addr;
        }

        if let Some(secs) = lookup("SCANRELAY_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ScanError::Config(format!(
                    "SCANRELAY_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    secs
                ))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(bytes) = lookup("SCANRELAY_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes.trim().parse().map_err(|_| {
                ScanError::Config(format!(
                    "SCANRELAY_MAX_UPLOAD_BYTES must be a whole number of bytes, got '{}'",
                    bytes
                ))
            })?;
        }

        Ok(config)
    }
}
