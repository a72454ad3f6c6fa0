// HTTP surface: routes, multipart parsing and error-to-status mapping

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::core::config::Config;
use crate::core::errors::{OcrError, PipelineError, ValidationError};
use crate::core::types::{TranslateForm, UploadedFile};
use crate::orchestration::PipelineOrchestrator;
use crate::utils::Metrics;

const HTML: &str = "text/html; charset=utf-8";
const PLAIN: &str = "text/plain; charset=utf-8";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub metrics: Metrics,
    /// Flips to `true` when the server starts shutting down
    pub shutdown: watch::Receiver<bool>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/", get(root).post(translate_image))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.record_endpoint_request("GET /");
    ([(header::CONTENT_TYPE, HTML)], "server is running")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(State(state): State<AppState>) -> Json<crate::utils::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Translate the text found in an uploaded image
///
/// # Request Format:
/// - multipart/form-data
/// - Field "file": image (png, jpg, jpeg, gif)
/// - Field "targetLang" (optional): target language code, defaults to "en"
///
/// # Response:
/// - 200 with the translated text, or a plain-text error with a 4xx/5xx status
async fn translate_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    state.metrics.record_endpoint_request("POST /");

    let form = match multipart {
        Ok(multipart) => read_form(multipart).await,
        Err(rejection) => Err(ValidationError::MalformedForm(rejection.body_text())),
    };
    let form = match form {
        Ok(form) => form,
        Err(e) => {
            state.metrics.record_pipeline_failure("validation");
            return PipelineError::from(e).into_response();
        }
    };

    info!(
        "Received translate request (file: {}, target: {:?})",
        form.file.as_ref().map(|f| f.filename.as_str()).unwrap_or("<none>"),
        form.target_lang
    );

    // Abort the pipeline if the server begins shutting down mid-request
    let mut shutdown = state.shutdown.clone();
    let cancelled = async move {
        let stopped = shutdown.wait_for(|stop| *stop).await.is_ok();
        if !stopped {
            // Sender gone without a shutdown: never cancel.
            std::future::pending::<()>().await;
        }
    };

    match state.orchestrator.run_until(form, cancelled).await {
        Ok(result) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HTML)],
            result.translated_text,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Collect the `file` and `targetLang` parts; other fields are ignored
async fn read_form(mut multipart: Multipart) -> Result<TranslateForm, ValidationError> {
    let mut form = TranslateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::MalformedForm(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                // Plain text parts are not uploads, and the first upload wins
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                if form.file.is_some() {
                    continue;
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ValidationError::MalformedForm(e.body_text()))?;

                // An empty file input is submitted as a nameless, empty part
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "targetLang" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ValidationError::MalformedForm(e.body_text()))?;
                form.target_lang = Some(value);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// HTTP status for each failure class
pub fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Validation(ValidationError::UnsupportedExtension { .. })
        | PipelineError::Validation(ValidationError::UnrecognizedImageFormat) => {
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        }
        PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
        PipelineError::Ocr(OcrError::NoTextRecognized { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Ocr(OcrError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::Ocr(_) | PipelineError::Detection(_) | PipelineError::Translation(_) => {
            StatusCode::BAD_GATEWAY
        }
        PipelineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        } else {
            warn!("Request rejected with {}: {}", status, self);
        }
        (status, [(header::CONTENT_TYPE, PLAIN)], self.to_string()).into_response()
    }
}
