// src/models.rs
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{Result, ScanError};

/// Largest file the public API accepts for direct upload (32 MiB).
pub const MAX_FILE_SIZE: u64 = 32 * 1024 * 1024;

/// A file or URL handed to the scanning service.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Url { value: String },
    File { bytes: Vec<u8>, name: String, size: u64 },
}

impl Submission {
    /// Validates and wraps a URL submission.
    pub fn url(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ScanError::BadRequest);
        }
        Url::parse(value).map_err(|_| ScanError::BadRequest)?;
        Ok(Submission::Url {
            value: value.to_string(),
        })
    }

    /// Wraps file contents, rejecting anything over [`MAX_FILE_SIZE`].
    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let size = bytes.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(ScanError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            });
        }
        Ok(Submission::File {
            bytes,
            name: name.into(),
            size,
        })
    }

    /// Short label used in progress messages.
    pub fn label(&self) -> &str {
        match self {
            Submission::Url { value } => value,
            Submission::File { name, .. } => name,
        }
    }
}

/// Identifier the service hands back once a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: String,
}

impl SubmissionReceipt {
    /// Extracts `data.id` from a submission response body.
    pub fn from_response(body: &serde_json::Value) -> Result<Self> {
        body.get("data")
            .and_then(|d| d.get("id"))
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
            .map(|id| SubmissionReceipt { id: id.to_string() })
            .ok_or_else(|| ScanError::InvalidResponse("submission response has no data.id".to_string()))
    }
}

/// Rejects analysis ids that could escape the `analyses/{id}` path segment.
///
/// Ids handed out by the service are base64-like: letters, digits, `=`, `_`,
/// `-` and `+`.
pub fn check_analysis_id(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && id.len() <= 256
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'_' | b'-' | b'+'));
    if valid { Ok(id) } else { Err(ScanError::BadRequest) }
}

/// `GET /analyses/{id}` response body. Every level is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisEnvelope {
    #[serde(default)]
    pub data: Option<AnalysisData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Option<AnalysisAttributes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisAttributes {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stats: Option<BTreeMap<String, u64>>,
    #[serde(default)]
    pub results: Option<BTreeMap<String, EngineResult>>,
}

/// One engine's entry in the `results` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub category: String,
    #[serde(default)]
    pub engine_name: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl AnalysisStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => AnalysisStatus::Queued,
            "in-progress" | "in_progress" => AnalysisStatus::InProgress,
            "completed" => AnalysisStatus::Completed,
            "failed" => AnalysisStatus::Failed,
            other => AnalysisStatus::Other(other.to_string()),
        }
    }
}

/// Analysis state as seen by the poller and presenter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub status: AnalysisStatus,
    pub stats: Option<BTreeMap<String, u64>>,
    pub results: Option<BTreeMap<String, EngineResult>>,
}

impl AnalysisEnvelope {
    /// Resolves the optional wire shape. A missing status is `InvalidResponse`.
    pub fn into_report(self) -> Result<AnalysisReport> {
        match self.data.and_then(|d| d.attributes) {
            Some(AnalysisAttributes {
                status: Some(status),
                stats,
                results,
            }) => Ok(AnalysisReport {
                status: AnalysisStatus::parse(&status),
                stats,
                results,
            }),
            Some(AnalysisAttributes { status: None, .. }) | None => Err(ScanError::InvalidResponse(
                "analysis response has no status".to_string(),
            )),
        }
    }
}
