// src/api/handlers/analyses.rs
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Result};
use serde::Serialize;

use super::{error_response, proxy_status, relay_response};
use crate::api::AppState;
use crate::models::check_analysis_id;
use crate::poller::Poller;
use crate::report::{self, RenderedVerdict};

#[derive(Serialize)]
pub struct VerdictResponse {
    pub id: String,
    /// `completed`, `failed`, `timed_out`, `transport_error`, `cancelled` or `invalid_report`.
    pub outcome: String,
    pub verdict: Option<RenderedVerdict>,
    pub error: Option<String>,
    pub finished_at: String,
}

/// `GET /api/analyses/{id}`: relays the raw analysis resource.
pub async fn get_analysis(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();

    let relayed = match state.service.analysis_request(&id) {
        Ok(request) => state.service.relay(request).await,
        Err(e) => Err(e),
    };

    match relayed {
        Ok(relayed) => Ok(relay_response(relayed)),
        Err(e) => {
            log::warn!("Lookup of analysis {} failed: {:?}", id, e);
            Ok(error_response(proxy_status(&e), &e))
        }
    }
}

/// `GET /api/analyses/{id}/verdict`: polls until the analysis settles and
/// answers with the rendered verdict or the reason there is none.
pub async fn get_verdict(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if let Err(e) = check_analysis_id(&id) {
        log::warn!("Rejected verdict request for malformed analysis id");
        return Ok(error_response(e.status_code(), &e));
    }
    let cancel = state.shutdown.child_token();

    let outcome = Poller::new(&state.service, &state.config.poll)
        .poll(&id, &cancel, |progress| log::info!("[{}] {}", progress.id, progress))
        .await;

    let tag = outcome.tag();
    let rendered = outcome
        .into_result()
        .and_then(|analysis| report::present(&analysis));
    let finished_at = chrono::Utc::now().to_rfc3339();

    match rendered {
        Ok(verdict) => {
            log::info!("[{}] {}", id, verdict);
            Ok(HttpResponse::Ok().json(VerdictResponse {
                id,
                outcome: tag.to_string(),
                verdict: Some(verdict),
                error: None,
                finished_at,
            }))
        }
        Err(e) => {
            let outcome = if tag == "completed" { "invalid_report" } else { tag };
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(HttpResponse::build(status).json(VerdictResponse {
                id,
                outcome: outcome.to_string(),
                verdict: None,
                error: Some(e.to_string()),
                finished_at,
            }))
        }
    }
}
