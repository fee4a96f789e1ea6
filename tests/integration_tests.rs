// tests/integration_tests.rs
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use scanrelay::api::{configure_routes, AppState};
use scanrelay::config::{AppConfig, VirusTotalConfig};
use scanrelay::errors::ScanError;
use scanrelay::models::Submission;
use scanrelay::poller::{PollConfig, PollOutcome};
use scanrelay::report::Verdict;
use scanrelay::runner::run_scan;
use scanrelay::service::virustotal::VirusTotalService;
use scanrelay::service::ScanService;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "scanrelay-test-boundary";

fn test_config(server: &MockServer) -> AppConfig {
    let virustotal = VirusTotalConfig::new("test-key").with_api_base(format!("{}/api/v3", server.uri()));
    let mut config = AppConfig::new(virustotal);
    config.poll = PollConfig {
        initial_interval_ms: 1,
        max_interval_ms: 4,
        settle_delay: Duration::ZERO,
        ..PollConfig::default()
    };
    config
}

fn test_service(server: &MockServer) -> VirusTotalService {
    let config = test_config(server);
    VirusTotalService::new(reqwest::Client::new(), config.virustotal)
}

fn analysis(status: &str) -> Value {
    json!({
        "data": {
            "id": "abc",
            "type": "analysis",
            "attributes": {
                "status": status,
                "stats": {"malicious": 2, "suspicious": 1, "harmless": 50, "undetected": 7},
                "results": {
                    "Alpha": {"category": "malicious", "engine_name": "Alpha", "result": "EICAR-Test-File"},
                    "Bravo": {"category": "harmless", "engine_name": "Bravo", "result": null}
                }
            }
        }
    })
}

fn multipart_body(field: &str, filename: &str, contents: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n--{b}--\r\n",
        b = BOUNDARY,
        field = field,
        filename = filename,
        contents = contents
    )
}

macro_rules! app_for {
    ($server:expr) => {
        app_for!($server, test_config($server))
    };
    ($server:expr, $config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new($config).unwrap()))
                .configure(configure_routes),
        )
        .await
    };
}

fn multipart_request(payload: String) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/scan")
        .insert_header((
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(payload)
}

async fn verdict_for(server: &MockServer, id: &str, body: Value) -> (StatusCode, Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/analyses/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
    let app = app_for!(server);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/analyses/{}/verdict", id))
            .to_request(),
    )
    .await;
    let status = resp.status();
    (status, test::read_body_json(resp).await)
}

#[actix_web::test]
async fn test_non_post_is_method_not_allowed() {
    let server = MockServer::start().await;
    let app = app_for!(&server);

    for req in [
        test::TestRequest::get().uri("/api/scan").to_request(),
        test::TestRequest::put().uri("/api/scan").to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Method Not Allowed"}));
    }
}

#[actix_web::test]
async fn test_invalid_url_request_is_bad_request() {
    let server = MockServer::start().await;
    let app = app_for!(&server);

    for payload in [r#"{"type":"file"}"#, r#"{"type":"url"}"#, "not json"] {
        let req = test::TestRequest::post()
            .uri("/api/scan")
            .insert_header(("content-type", "application/json"))
            .set_payload(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Invalid request"}));
    }
}

#[actix_web::test]
async fn test_url_submission_is_forwarded_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/urls"))
        .and(header("x-apikey", "test-key"))
        .and(body_string("url=https%3A%2F%2Fexample.com%2Flogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "u-abc", "type": "analysis"}})))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let req = test::TestRequest::post()
        .uri("/api/scan")
        .set_json(json!({"type": "url", "url": "https://example.com/login"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"data": {"id": "u-abc", "type": "analysis"}}));
}

#[actix_web::test]
async fn test_remote_error_status_is_relayed() {
    let server = MockServer::start().await;
    let quota = json!({"error": {"code": "QuotaExceededError", "message": "Quota exceeded"}});
    Mock::given(method("POST"))
        .and(path("/api/v3/urls"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota.clone()))
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let req = test::TestRequest::post()
        .uri("/api/scan")
        .set_json(json!({"type": "url", "url": "https://example.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, quota);
}

#[actix_web::test]
async fn test_file_upload_is_streamed_to_files_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/files"))
        .and(header("x-apikey", "test-key"))
        .and(body_string("hello scanner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "f-1", "type": "analysis"}})))
        .expect(1)
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let req = multipart_request(multipart_body("file", "sample.txt", "hello scanner")).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["id"], "f-1");
}

#[actix_web::test]
async fn test_oversized_upload_is_cut_off() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "f-1", "type": "analysis"}})))
        .mount(&server)
        .await;
    let mut config = test_config(&server);
    config.max_upload_bytes = 8;
    let app = app_for!(&server, config);

    let req = multipart_request(multipart_body("file", "big.bin", "hello scanner")).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "File size 13 bytes exceeds the 8 byte limit"}));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.body != b"hello scanner"));
}

#[actix_web::test]
async fn test_upload_at_limit_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/files"))
        .and(body_string("hello scanner"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "f-2", "type": "analysis"}})))
        .expect(1)
        .mount(&server)
        .await;
    let mut config = test_config(&server);
    config.max_upload_bytes = 13;
    let app = app_for!(&server, config);

    let req = multipart_request(multipart_body("file", "edge.bin", "hello scanner")).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["id"], "f-2");
}

#[actix_web::test]
async fn test_malformed_multipart_is_upload_error() {
    let server = MockServer::start().await;
    let app = app_for!(&server);

    let payloads = [
        "this is not a multipart body".to_string(),
        multipart_body("document", "sample.txt", "no file field here"),
    ];
    for payload in payloads {
        let resp = test::call_service(&app, multipart_request(payload).to_request()).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Upload failed"}));
        assert!(!body.to_string().contains("test-key"));
    }
}

#[actix_web::test]
async fn test_analysis_lookup_is_relayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/abc"))
        .and(header("x-apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis("queued")))
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let req = test::TestRequest::get().uri("/api/analyses/abc").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, analysis("queued"));
}

#[actix_web::test]
async fn test_analysis_id_cannot_reach_other_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "me"}})))
        .expect(0)
        .mount(&server)
        .await;
    let app = app_for!(&server);

    for uri in [
        "/api/analyses/..%2Fusers%2Fme",
        "/api/analyses/..%2Fusers%2Fme/verdict",
        "/api/analyses/abc%3Fx%3D1",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Invalid request"}));
    }

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_verdict_endpoint_polls_until_completed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis("queued")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis("completed")))
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let req = test::TestRequest::get().uri("/api/analyses/abc/verdict").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["verdict"]["verdict"], "Malicious");
    assert_eq!(body["verdict"]["total"], 60);
    assert_eq!(body["verdict"]["engines"][0]["class"], "malicious");
    assert!(body["error"].is_null());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[actix_web::test]
async fn test_verdict_endpoint_distinguishes_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis("failed")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"error": {"code": "NotFoundError", "message": "Analysis not found"}})),
        )
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/analyses/broken/verdict").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["error"], "Analysis failed");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/analyses/missing/verdict").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "transport_error");
    assert_eq!(body["error"], "Request failed: Analysis not found");
}

#[actix_web::test]
async fn test_verdict_endpoint_zero_counts_is_invalid_report() {
    let server = MockServer::start().await;
    let body = json!({"data": {"attributes": {
        "status": "completed",
        "stats": {"malicious": 0, "suspicious": 0, "harmless": 0, "undetected": 0}
    }}});

    let (status, body) = verdict_for(&server, "empty", body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["outcome"], "invalid_report");
    assert_eq!(body["error"], "No analysis results available");
    assert!(body["verdict"].is_null());
}

#[actix_web::test]
async fn test_verdict_endpoint_missing_stats_is_invalid_report() {
    let server = MockServer::start().await;
    let body = json!({"data": {"attributes": {"status": "completed"}}});

    let (status, body) = verdict_for(&server, "nostats", body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["outcome"], "invalid_report");
    assert_eq!(body["error"], "Invalid report format");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[actix_web::test]
async fn test_verdict_endpoint_missing_status_is_transport_error() {
    let server = MockServer::start().await;
    let body = json!({"data": {"id": "nostatus", "attributes": {
        "stats": {"malicious": 1, "harmless": 3}
    }}});

    let (status, body) = verdict_for(&server, "nostatus", body).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["outcome"], "transport_error");
    assert_eq!(body["error"], "Invalid analysis response: analysis response has no status");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[actix_web::test]
async fn test_verdict_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis("in-progress")))
        .mount(&server)
        .await;
    let app = app_for!(&server);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/analyses/slow/verdict").to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "timed_out");
    assert_eq!(server.received_requests().await.unwrap().len(), 20);
}

#[actix_web::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    let app = app_for!(&server);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["service"], "scanrelay");
}

#[tokio::test]
async fn test_request_helper_normalizes_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/quota"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "Quota exceeded"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>down</html>"))
        .mount(&server)
        .await;
    let service = test_service(&server);

    match service.fetch_analysis("quota").await {
        Err(ScanError::RequestFailed(message)) => assert_eq!(message, "Quota exceeded"),
        other => panic!("unexpected result: {:?}", other),
    }
    match service.fetch_analysis("down").await {
        Err(ScanError::RequestFailed(message)) => assert_eq!(message, "Service Unavailable"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_then_poll_uses_receipt_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/urls"))
        .and(header("x-apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "abc", "type": "analysis"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/analyses/abc"))
        .and(header("x-apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(analysis("completed")))
        .expect(1)
        .mount(&server)
        .await;
    let service = test_service(&server);
    let config = test_config(&server);
    let submission = Submission::url("https://example.com").unwrap();

    let run = run_scan(&service, &config.poll, submission, &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(run.receipt.id, "abc");
    assert!(matches!(run.outcome, PollOutcome::Completed(_)));
    let verdict = run.render().unwrap();
    assert_eq!(verdict.verdict, Verdict::Malicious);
    assert_eq!(verdict.detection_rate, 3.3);
}

#[tokio::test]
async fn test_file_submission_posts_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/files"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_string("MZ\u{90}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "f-9"}})))
        .expect(1)
        .mount(&server)
        .await;
    let service = test_service(&server);

    let submission = Submission::file("tiny.exe", "MZ\u{90}".as_bytes().to_vec()).unwrap();
    let receipt = service.submit(submission).await.unwrap();
    assert_eq!(receipt.id, "f-9");
}
