// src/service/virustotal.rs

use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Client, Method, RequestBuilder, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Instant;

use crate::config::VirusTotalConfig;
use crate::errors::{Result, ScanError};
use crate::models::{check_analysis_id, AnalysisEnvelope, Submission, SubmissionReceipt};
use crate::service::ScanService;

const API_KEY_HEADER: &str = "x-apikey";

/// Client for the VirusTotal v3 API. Every request it builds carries the credential.
#[derive(Clone)]
pub struct VirusTotalService {
    client: Client,
    config: VirusTotalConfig,
}

/// A remote response passed through untouched.
#[derive(Debug, Clone)]
pub struct Relayed {
    pub status: u16,
    pub body: serde_json::Value,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

impl VirusTotalService {
    /// Creates a new `VirusTotalService`.
    pub fn new(client: Client, config: VirusTotalConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Starts a request to `path` with the credential header attached.
    pub fn authorized(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
    }

    /// `POST /files` with the raw file bytes, owned or streamed, as the body.
    pub fn file_request(&self, body: impl Into<Body>) -> RequestBuilder {
        self.authorized(Method::POST, "files")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
    }

    /// `POST /urls` with a form-encoded `url=` body.
    pub fn url_request(&self, url: &str) -> RequestBuilder {
        self.authorized(Method::POST, "urls").form(&[("url", url)])
    }

    /// `GET /analyses/{id}`. The id must pass [`check_analysis_id`] and is
    /// appended as a single encoded path segment.
    pub fn analysis_request(&self, id: &str) -> Result<RequestBuilder> {
        let id = check_analysis_id(id)?;
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| ScanError::Config(format!("Invalid VirusTotal API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ScanError::Config("VirusTotal API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .push("analyses")
            .push(id);

        Ok(self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret()))
    }

    pub fn submission_request(&self, submission: Submission) -> RequestBuilder {
        match submission {
            Submission::Url { value } => self.url_request(&value),
            Submission::File { bytes, .. } => self.file_request(bytes),
        }
    }

    /// Sends the request and returns its JSON body.
    ///
    /// Every failure is folded into `ScanError::RequestFailed`: the service's
    /// `{error: {message}}` when present, otherwise the status text.
    pub async fn request(&self, builder: RequestBuilder) -> Result<serde_json::Value> {
        let start = Instant::now();
        let resp = builder
            .send()
            .await
            .map_err(|e| ScanError::RequestFailed(e.without_url().to_string()))?;

        let status = resp.status();
        log::debug!(
            "VirusTotal responded {} in {}ms",
            status,
            start.elapsed().as_millis()
        );

        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("Request failed").to_string();
            let message = resp
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|error| error.message)
                .unwrap_or(fallback);
            log::warn!("VirusTotal request failed with status {}: {}", status, message);
            return Err(ScanError::RequestFailed(message));
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| ScanError::RequestFailed(e.without_url().to_string()))
    }

    /// Sends the request and hands back status and JSON body verbatim,
    /// whatever the status. Fails only when no JSON body comes back.
    pub async fn relay(&self, builder: RequestBuilder) -> Result<Relayed> {
        let resp = builder.send().await.map_err(|e| {
            log::error!("Could not reach VirusTotal: {}", e.without_url());
            ScanError::RequestFailed("scanning service unreachable".to_string())
        })?;

        let status = resp.status().as_u16();
        let body = resp.json::<serde_json::Value>().await.map_err(|e| {
            log::error!("VirusTotal returned a non-JSON body ({}): {}", status, e.without_url());
            ScanError::RequestFailed("scanning service returned an unreadable response".to_string())
        })?;

        Ok(Relayed { status, body })
    }
}

impl ScanService for VirusTotalService {
    async fn submit(&self, submission: Submission) -> Result<SubmissionReceipt> {
        log::info!("Submitting {} for analysis", submission.label());
        let body = self.request(self.submission_request(submission)).await?;
        SubmissionReceipt::from_response(&body)
    }

    async fn fetch_analysis(&self, id: &str) -> Result<AnalysisEnvelope> {
        let body = self.request(self.analysis_request(id)?).await?;
        serde_json::from_value(body).map_err(|e| ScanError::InvalidResponse(e.to_string()))
    }
}
