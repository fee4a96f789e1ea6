// src/service/mod.rs

use crate::errors::Result;
use crate::models::{AnalysisEnvelope, Submission, SubmissionReceipt};

pub mod virustotal;

/// The remote scanning service as seen by the runner and the poller.
///
/// Implementations return already-normalized errors: a failed call is always
/// `ScanError::RequestFailed` (or `InvalidResponse` for a malformed success body).
pub trait ScanService: Send + Sync {
    /// Submits a file or URL and returns the identifier of the analysis it started.
    fn submit(&self, submission: Submission) -> impl std::future::Future<Output = Result<SubmissionReceipt>> + Send;

    /// Fetches the current state of an analysis. Malformed ids are `BadRequest`.
    fn fetch_analysis(&self, id: &str) -> impl std::future::Future<Output = Result<AnalysisEnvelope>> + Send;
}
