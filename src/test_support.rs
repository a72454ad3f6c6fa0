// In-process stand-in for the Read and Translator services, used by tests

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{ApiConfig, Config, Credentials, OcrConfig, ServerConfig};

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        credentials: Credentials {
            key: "test-key".to_string(),
            region: "westeurope".to_string(),
        },
        vision_endpoint: format!("{}/", base_url),
        translator_endpoint: base_url.to_string(),
        translator_api_version: "3.0".to_string(),
        request_timeout: Duration::from_secs(5),
    }
}

/// Full config pointing every upstream at `base_url`, polling fast
pub fn test_config(base_url: &str) -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: tracing::Level::DEBUG,
            max_upload_bytes: 1024 * 1024,
        },
        api: api_config(base_url),
        ocr: OcrConfig {
            poll_interval: Duration::from_millis(10),
            poll_max_interval: Duration::from_millis(10),
            poll_backoff: 1.0,
            timeout: Duration::from_secs(5),
        },
    }
}

/// Encoded PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode test png");
    out.into_inner()
}

/// What the mock services answer
#[derive(Debug, Clone)]
pub struct MockScript {
    pub submit_status: u16,
    pub operation_location: bool,
    /// Status per poll; the last one repeats
    pub statuses: Vec<&'static str>,
    /// Lines per read result block
    pub read_results: Vec<Vec<&'static str>>,
    pub poll_status: u16,
    /// Replaces the generated status body when set
    pub poll_raw_body: Option<&'static str>,
    pub detect_status: u16,
    pub detect_body: Value,
    pub translate_status: u16,
    pub translate_body: Value,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            submit_status: 202,
            operation_location: true,
            statuses: vec!["running", "succeeded"],
            read_results: vec![vec!["Bonjour"]],
            poll_status: 200,
            poll_raw_body: None,
            detect_status: 200,
            detect_body: json!([{
                "language": "fr",
                "score": 1.0,
                "isTranslationSupported": true,
                "isTransliterationSupported": false
            }]),
            translate_status: 200,
            translate_body: json!([{"translations": [{"text": "Hello", "to": "en"}]}]),
        }
    }
}

/// What the mock services saw
#[derive(Default)]
pub struct Recorded {
    submits: AtomicUsize,
    polls: AtomicUsize,
    detects: AtomicUsize,
    translates: AtomicUsize,
    submitted_sizes: Mutex<Vec<usize>>,
    polled_ids: Mutex<Vec<String>>,
    subscription_keys: Mutex<Vec<String>>,
    regions: Mutex<Vec<String>>,
    detect_texts: Mutex<Vec<String>>,
    detect_params: Mutex<Vec<HashMap<String, String>>>,
    translate_params: Mutex<Vec<HashMap<String, String>>>,
    trace_ids: Mutex<Vec<String>>,
}

impl Recorded {
    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn detects(&self) -> usize {
        self.detects.load(Ordering::SeqCst)
    }

    pub fn translates(&self) -> usize {
        self.translates.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.submits() + self.polls() + self.detects() + self.translates()
    }

    pub fn submitted_sizes(&self) -> Vec<usize> {
        self.submitted_sizes.lock().clone()
    }

    pub fn polled_ids(&self) -> Vec<String> {
        self.polled_ids.lock().clone()
    }

    pub fn subscription_keys(&self) -> Vec<String> {
        self.subscription_keys.lock().clone()
    }

    pub fn regions(&self) -> Vec<String> {
        self.regions.lock().clone()
    }

    pub fn detect_texts(&self) -> Vec<String> {
        self.detect_texts.lock().clone()
    }

    pub fn detect_params(&self) -> Vec<HashMap<String, String>> {
        self.detect_params.lock().clone()
    }

    pub fn translate_params(&self) -> Vec<HashMap<String, String>> {
        self.translate_params.lock().clone()
    }

    pub fn trace_ids(&self) -> Vec<String> {
        self.trace_ids.lock().clone()
    }
}

struct MockState {
    script: MockScript,
    base_url: String,
    recorded: Arc<Recorded>,
}

/// Running mock, alive for as long as the test runtime
pub struct MockUpstream {
    pub base_url: String,
    pub recorded: Arc<Recorded>,
}

impl MockScript {
    pub async fn spawn(self) -> MockUpstream {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let base_url = format!("http://{}", listener.local_addr().expect("mock addr"));
        let recorded = Arc::new(Recorded::default());

        let state = Arc::new(MockState {
            script: self,
            base_url: base_url.clone(),
            recorded: recorded.clone(),
        });

        let app = Router::new()
            .route("/vision/v3.2/read/analyze", post(submit))
            .route("/vision/v3.2/read/analyzeResults/:id", get(analyze_results))
            .route("/detect", post(detect))
            .route("/translate", post(translate))
            .with_state(state);

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        MockUpstream { base_url, recorded }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).expect("valid mock status")
}

async fn submit(State(s): State<Arc<MockState>>, headers: HeaderMap, body: Bytes) -> Response {
    s.recorded.submits.fetch_add(1, Ordering::SeqCst);
    s.recorded.submitted_sizes.lock().push(body.len());
    if let Some(key) = header(&headers, "Ocp-Apim-Subscription-Key") {
        s.recorded.subscription_keys.lock().push(key);
    }

    let code = status(s.script.submit_status);
    if !code.is_success() {
        return (code, "submission rejected").into_response();
    }

    let mut response = code.into_response();
    if s.script.operation_location {
        let location = format!("{}/vision/v3.2/read/analyzeResults/job-42", s.base_url);
        response.headers_mut().insert(
            "Operation-Location",
            HeaderValue::from_str(&location).expect("valid location"),
        );
    }
    response
}

async fn analyze_results(State(s): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    let n = s.recorded.polls.fetch_add(1, Ordering::SeqCst);
    s.recorded.polled_ids.lock().push(id);

    let code = status(s.script.poll_status);
    if !code.is_success() {
        return (code, "operation lookup failed").into_response();
    }
    if let Some(raw) = s.script.poll_raw_body {
        return (code, raw).into_response();
    }

    let status = s
        .script
        .statuses
        .get(n)
        .or(s.script.statuses.last())
        .copied()
        .unwrap_or("succeeded");

    let mut body = json!({
        "status": status,
        "createdDateTime": "2024-01-01T00:00:00Z",
        "lastUpdatedDateTime": "2024-01-01T00:00:01Z"
    });
    if status == "succeeded" {
        let read_results: Vec<Value> = s
            .script
            .read_results
            .iter()
            .enumerate()
            .map(|(i, lines)| {
                json!({
                    "page": i + 1,
                    "angle": 0,
                    "lines": lines
                        .iter()
                        .map(|text| json!({"text": text, "boundingBox": [0, 0, 10, 0, 10, 10, 0, 10]}))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        body["analyzeResult"] = json!({"version": "3.2.0", "readResults": read_results});
    }
    Json(body).into_response()
}

fn record_auth(s: &MockState, headers: &HeaderMap) {
    if let Some(key) = header(headers, "Ocp-Apim-Subscription-Key") {
        s.recorded.subscription_keys.lock().push(key);
    }
    if let Some(region) = header(headers, "Ocp-Apim-Subscription-Region") {
        s.recorded.regions.lock().push(region);
    }
}

async fn detect(
    State(s): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    s.recorded.detects.fetch_add(1, Ordering::SeqCst);
    record_auth(&s, &headers);
    s.recorded.detect_params.lock().push(params);
    if let Some(text) = body[0]["text"].as_str() {
        s.recorded.detect_texts.lock().push(text.to_string());
    }

    (status(s.script.detect_status), Json(s.script.detect_body.clone())).into_response()
}

async fn translate(
    State(s): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Response {
    s.recorded.translates.fetch_add(1, Ordering::SeqCst);
    record_auth(&s, &headers);
    s.recorded.translate_params.lock().push(params);
    if let Some(trace_id) = header(&headers, "X-ClientTraceId") {
        s.recorded.trace_ids.lock().push(trace_id);
    }

    (status(s.script.translate_status), Json(s.script.translate_body.clone())).into_response()
}
