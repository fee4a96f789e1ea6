// src/errors.rs
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error("Invalid request")]
    BadRequest,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("Upload failed")]
    UploadError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),

    #[error("Analysis failed")]
    AnalysisFailed,

    #[error("Analysis timed out after {attempts} attempts, try again")]
    AnalysisTimedOut { attempts: u32 },

    #[error("Invalid report format")]
    InvalidFormat,

    #[error("No analysis results available")]
    NoResults,

    #[error("File size {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Scan was cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    /// HTTP status the proxy answers with when this error reaches a handler.
    pub fn status_code(&self) -> u16 {
        match self {
            ScanError::BadRequest => 400,
            ScanError::MethodNotAllowed => 405,
            ScanError::FileTooLarge { .. } => 413,
            ScanError::InvalidFormat | ScanError::NoResults => 422,
            ScanError::RequestFailed(_)
            | ScanError::InvalidResponse(_)
            | ScanError::AnalysisFailed => 502,
            ScanError::Cancelled => 503,
            ScanError::AnalysisTimedOut { .. } => 504,
            ScanError::UploadError(_) | ScanError::Config(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
