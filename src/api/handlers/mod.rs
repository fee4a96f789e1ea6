// src/api/handlers/mod.rs
mod health;
mod scan;
mod analyses;

pub use health::health_check;
pub use scan::{submit_scan, method_not_allowed, UrlScanRequest};
pub use analyses::{get_analysis, get_verdict, VerdictResponse};

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

use crate::errors::ScanError;
use crate::service::virustotal::Relayed;

/// `{"error": ...}` body with the given status. Only the error's display
/// text is sent, never its internal detail.
pub(crate) fn error_response(status: u16, err: &ScanError) -> HttpResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(json!({ "error": err.to_string() }))
}

/// Status the proxy routes use for an error. Upstream failures surface as 500.
pub(crate) fn proxy_status(err: &ScanError) -> u16 {
    match err {
        ScanError::RequestFailed(_) | ScanError::InvalidResponse(_) => 500,
        other => other.status_code(),
    }
}

/// Passes the remote status and JSON body through unchanged.
pub(crate) fn relay_response(relayed: Relayed) -> HttpResponse {
    let status = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY);
    HttpResponse::build(status).json(relayed.body)
}
