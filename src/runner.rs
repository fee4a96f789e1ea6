// src/runner.rs
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, ScanError};
use crate::models::{Submission, SubmissionReceipt};
use crate::poller::{PollConfig, PollOutcome, PollProgress, Poller};
use crate::report::{self, RenderedVerdict};
use crate::service::ScanService;

/// A submission that has been driven to a terminal poll state.
#[derive(Debug)]
pub struct ScanRun {
    pub receipt: SubmissionReceipt,
    pub outcome: PollOutcome,
    pub elapsed_ms: u64,
}

impl ScanRun {
    /// Presents a completed analysis, or returns why there is nothing to present.
    pub fn render(&self) -> Result<RenderedVerdict> {
        match &self.outcome {
            PollOutcome::Completed(report) => report::present(report),
            PollOutcome::Failed => Err(ScanError::AnalysisFailed),
            PollOutcome::TimedOut { attempts } => Err(ScanError::AnalysisTimedOut { attempts: *attempts }),
            PollOutcome::TransportError(err) => Err(err.clone()),
            PollOutcome::Cancelled => Err(ScanError::Cancelled),
        }
    }
}

/// Submits `submission`, then polls the returned analysis id until it settles.
///
/// Submission errors are returned directly; everything after the receipt is
/// reported through `ScanRun::outcome`.
pub async fn run_scan<S, F>(
    service: &S,
    config: &PollConfig,
    submission: Submission,
    cancel: &CancellationToken,
    on_progress: F,
) -> Result<ScanRun>
where
    S: ScanService,
    F: FnMut(&PollProgress),
{
    let start = Instant::now();
    let label = submission.label().to_string();
    let receipt = service.submit(submission).await?;
    log::info!("Submission {} accepted as analysis {}", label, receipt.id);

    if !config.settle_delay.is_zero() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(ScanRun {
                    receipt,
                    outcome: PollOutcome::Cancelled,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            _ = tokio::time::sleep(config.settle_delay) => {}
        }
    }

    let outcome = Poller::new(service, config).poll(&receipt.id, cancel, on_progress).await;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    log::info!("Analysis {} finished as {} in {}ms", receipt.id, outcome.tag(), elapsed_ms);

    Ok(ScanRun {
        receipt,
        outcome,
        elapsed_ms,
    })
}
