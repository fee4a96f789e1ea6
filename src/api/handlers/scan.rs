// src/api/handlers/scan.rs
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::{error_response, proxy_status, relay_response};
use crate::api::AppState;
use crate::errors::ScanError;
use crate::service::virustotal::Relayed;

/// Upper bound for the JSON body of a URL submission.
const MAX_URL_REQUEST_BYTES: usize = 64 * 1024;

/// Chunks of an upload that may wait for the outbound connection.
const UPLOAD_CHANNEL_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct UrlScanRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
}

impl UrlScanRequest {
    /// The URL to scan, if the request is well formed.
    pub fn target(&self) -> Option<&str> {
        match (self.kind.as_deref(), self.url.as_deref().map(str::trim)) {
            (Some("url"), Some(url)) if !url.is_empty() => Some(url),
            _ => None,
        }
    }
}

/// `POST /api/scan`: multipart uploads go to `/files`, everything else is read
/// as a JSON URL submission and goes to `/urls`.
pub async fn submit_scan(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse> {
    let request_id = Uuid::new_v4();

    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);

    let forwarded = if is_multipart {
        forward_file(&state, &req, payload, request_id).await
    } else {
        forward_url(&state, payload, request_id).await
    };

    match forwarded {
        Ok(relayed) => {
            log::info!("[{}] VirusTotal answered {}", request_id, relayed.status);
            Ok(relay_response(relayed))
        }
        Err(e) => {
            log::warn!("[{}] Submission rejected: {:?}", request_id, e);
            Ok(error_response(proxy_status(&e), &e))
        }
    }
}

pub async fn method_not_allowed() -> Result<HttpResponse> {
    let err = ScanError::MethodNotAllowed;
    let mut response = error_response(err.status_code(), &err);
    response
        .headers_mut()
        .insert(header::ALLOW, header::HeaderValue::from_static("POST"));
    Ok(response)
}

async fn forward_file(
    state: &AppState,
    req: &HttpRequest,
    payload: web::Payload,
    request_id: Uuid,
) -> crate::errors::Result<Relayed> {
    let upload_error = |e: actix_multipart::MultipartError| ScanError::UploadError(e.to_string());
    let mut multipart = Multipart::new(req.headers(), payload);

    while let Some(field) = multipart.next().await {
        let mut field = field.map_err(upload_error)?;

        if field.name() != Some("file") {
            while let Some(chunk) = field.next().await {
                chunk.map_err(upload_error)?;
            }
            continue;
        }

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("upload")
            .to_string();
        log::info!("[{}] Forwarding file '{}'", request_id, file_name);

        // Multipart fields are not `Send`, so chunks cross into the outbound
        // body through a bounded channel instead of being buffered.
        let max = state.config.max_upload_bytes;
        let (mut tx, rx) = mpsc::channel::<std::io::Result<web::Bytes>>(UPLOAD_CHANNEL_DEPTH);
        let upload = state
            .service
            .relay(state.service.file_request(reqwest::Body::wrap_stream(rx)));

        let pump = async move {
            let mut size: u64 = 0;
            while let Some(chunk) = field.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(std::io::Error::other("upload interrupted"))).await;
                        return Err(upload_error(e));
                    }
                };

                size += chunk.len() as u64;
                if size > max {
                    let _ = tx.send(Err(std::io::Error::other("upload too large"))).await;
                    return Err(ScanError::FileTooLarge { size, max });
                }

                if tx.send(Ok(chunk)).await.is_err() {
                    // upstream stopped reading; its answer decides the response
                    break;
                }
            }
            Ok(size)
        };

        let (relayed, pumped) = futures::join!(upload, pump);
        let size = pumped?;
        let relayed = relayed?;
        log::info!("[{}] Streamed {} bytes of '{}'", request_id, size, file_name);
        return Ok(relayed);
    }

    Err(ScanError::UploadError("multipart payload has no 'file' field".to_string()))
}

async fn forward_url(
    state: &AppState,
    mut payload: web::Payload,
    request_id: Uuid,
) -> crate::errors::Result<Relayed> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|_| ScanError::BadRequest)?;
        if body.len() + chunk.len() > MAX_URL_REQUEST_BYTES {
            return Err(ScanError::BadRequest);
        }
        body.extend_from_slice(&chunk);
    }

    let request: UrlScanRequest = serde_json::from_slice(&body).map_err(|_| ScanError::BadRequest)?;
    let url = request.target().ok_or(ScanError::BadRequest)?;

    log::info!("[{}] Forwarding URL {}", request_id, url);
    state.service.relay(state.service.url_request(url)).await
}
