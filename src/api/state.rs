// src/api/state.rs
use crate::config::AppConfig;
use crate::errors::{Result, ScanError};
use crate::service::virustotal::VirusTotalService;
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub service: VirusTotalService,
    /// Cancelled on shutdown so in-flight verdict polls stop waiting.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to create HTTP client: {}", e)))?;
        let service = VirusTotalService::new(client, config.virustotal.clone());

        Ok(Self {
            config: Arc::new(config),
            service,
            shutdown: CancellationToken::new(),
        })
    }
}
