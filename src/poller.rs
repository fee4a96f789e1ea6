// src/poller.rs
//! Poll-and-backoff loop that waits for a remote analysis to settle.
//!
//! The deadline is attempt-counted: the loop gives up after
//! `max_attempts` non-terminal answers, however long those took.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, ScanError};
use crate::models::{AnalysisReport, AnalysisStatus};
use crate::service::ScanService;

/// Backoff parameters for one poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub backoff_multiplier: f64,
    pub max_interval_ms: u64,
    /// Pause between an accepted submission and the first poll.
    pub settle_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_interval_ms: 2000,
            backoff_multiplier: 1.5,
            max_interval_ms: 8000,
            settle_delay: Duration::from_secs(3),
        }
    }
}

impl PollConfig {
    /// The interval that follows `interval_ms`, capped at `max_interval_ms`.
    pub fn next_interval(&self, interval_ms: u64) -> u64 {
        let next = (interval_ms as f64 * self.backoff_multiplier).round() as u64;
        next.min(self.max_interval_ms)
    }
}

/// Mutable state of a single loop. Never shared between loops.
#[derive(Debug, Clone)]
pub struct PollState {
    pub id: String,
    pub attempt: u32,
    pub interval_ms: u64,
}

impl PollState {
    fn new(id: &str, config: &PollConfig) -> Self {
        Self {
            id: id.to_string(),
            attempt: 0,
            interval_ms: config.initial_interval_ms,
        }
    }
}

/// Emitted before every status query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollProgress {
    pub id: String,
    pub attempt: u32,
    pub interval_ms: u64,
    /// Display estimate only, rounded to the nearest second.
    pub remaining_secs: u64,
}

impl PollProgress {
    fn from_state(state: &PollState, config: &PollConfig) -> Self {
        let remaining_attempts = config.max_attempts.saturating_sub(state.attempt) as u64;
        Self {
            id: state.id.clone(),
            attempt: state.attempt,
            interval_ms: state.interval_ms,
            remaining_secs: (remaining_attempts * state.interval_ms + 500) / 1000,
        }
    }

    /// Human readable status line, optionally naming what is being analyzed.
    pub fn message(&self, label: Option<&str>) -> String {
        match label {
            Some(label) if !label.is_empty() => {
                format!("Analyzing {}... ({}s)", label, self.remaining_secs)
            }
            _ => format!("Analyzing... ({}s)", self.remaining_secs),
        }
    }
}

impl fmt::Display for PollProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message(None))
    }
}

/// How a poll loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    Completed(AnalysisReport),
    /// The service reported the analysis as failed.
    Failed,
    TimedOut { attempts: u32 },
    /// A query failed or returned something unusable.
    TransportError(ScanError),
    Cancelled,
}

impl PollOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PollOutcome::Completed(_))
    }

    /// Snake-case tag used when the outcome crosses an API boundary.
    pub fn tag(&self) -> &'static str {
        match self {
            PollOutcome::Completed(_) => "completed",
            PollOutcome::Failed => "failed",
            PollOutcome::TimedOut { .. } => "timed_out",
            PollOutcome::TransportError(_) => "transport_error",
            PollOutcome::Cancelled => "cancelled",
        }
    }

    pub fn into_result(self) -> Result<AnalysisReport> {
        match self {
            PollOutcome::Completed(report) => Ok(report),
            PollOutcome::Failed => Err(ScanError::AnalysisFailed),
            PollOutcome::TimedOut { attempts } => Err(ScanError::AnalysisTimedOut { attempts }),
            PollOutcome::TransportError(err) => Err(err),
            PollOutcome::Cancelled => Err(ScanError::Cancelled),
        }
    }
}

/// Drives one analysis id to a terminal state.
pub struct Poller<'a, S: ScanService> {
    service: &'a S,
    config: &'a PollConfig,
}

impl<'a, S: ScanService> Poller<'a, S> {
    pub fn new(service: &'a S, config: &'a PollConfig) -> Self {
        Self { service, config }
    }

    /// Polls `id` until it completes, fails, runs out of attempts or `cancel` fires.
    pub async fn poll<F>(&self, id: &str, cancel: &CancellationToken, mut on_progress: F) -> PollOutcome
    where
        F: FnMut(&PollProgress),
    {
        let mut state = PollState::new(id, self.config);

        loop {
            on_progress(&PollProgress::from_state(&state, self.config));

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                fetched = self.service.fetch_analysis(&state.id) => fetched,
            };

            let report = match fetched.and_then(|envelope| envelope.into_report()) {
                Ok(report) => report,
                Err(err) => {
                    log::warn!("Polling {} stopped: {}", state.id, err);
                    return PollOutcome::TransportError(err);
                }
            };

            match report.status.clone() {
                AnalysisStatus::Completed => {
                    log::info!("Analysis {} completed after {} queries", state.id, state.attempt + 1);
                    return PollOutcome::Completed(report);
                }
                AnalysisStatus::Failed => {
                    log::warn!("Analysis {} reported failure", state.id);
                    return PollOutcome::Failed;
                }
                pending => {
                    state.attempt += 1;
                    if state.attempt >= self.config.max_attempts {
                        log::warn!("Analysis {} still {:?} after {} attempts", state.id, pending, state.attempt);
                        return PollOutcome::TimedOut {
                            attempts: state.attempt,
                        };
                    }

                    log::debug!(
                        "Analysis {} is {:?}, retrying in {}ms",
                        state.id,
                        pending,
                        state.interval_ms
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return PollOutcome::Cancelled,
                        _ = tokio::time::sleep(Duration::from_millis(state.interval_ms)) => {}
                    }

                    state.interval_ms = self.config.next_interval(state.interval_ms);
                }
            }
        }
    }
}
