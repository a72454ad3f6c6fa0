// Custom error types for the translation pipeline
//
// Using thiserror so each stage has its own typed failure and the
// orchestrator can tell them apart when mapping to HTTP responses.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Request validation errors (raised before any upstream call)
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Request does not contain image file.")]
    MissingFile,

    #[error("Unsupported file type: {filename} (allowed: png, jpg, jpeg, gif)")]
    UnsupportedExtension { filename: String },

    #[error("Uploaded image is empty")]
    EmptyImage,

    #[error("File contents are not a png, jpeg or gif image")]
    UnrecognizedImageFormat,

    #[error("Malformed form data: {0}")]
    MalformedForm(String),
}

/// OCR (Read API) errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OCR service returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("OCR submission response has no Operation-Location header")]
    MissingOperationLocation,

    #[error("Cannot derive a job id from operation location: {0}")]
    InvalidOperationLocation(String),

    #[error("Invalid OCR response format: {0}")]
    MalformedResponse(String),

    #[error("OCR job {job_id} failed")]
    JobFailed { job_id: String },

    #[error("OCR job {job_id} did not finish within {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("OCR job {job_id} succeeded but recognized no text")]
    NoTextRecognized { job_id: String },
}

/// Language detection errors
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Detection request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Detection service returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("Invalid detection response format: {0}")]
    MalformedResponse(String),

    #[error("Detection response is missing field `{0}`")]
    MissingField(&'static str),
}

/// Translation errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Translation service returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("Invalid translation response format: {0}")]
    MalformedResponse(String),

    #[error("Translation response is missing field `{0}`")]
    MissingField(&'static str),
}

/// Pipeline orchestration errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Text recognition failed: {0}")]
    Ocr(#[from] OcrError),

    #[error("Language detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error("Pipeline cancelled before completion")]
    Cancelled,
}

impl PipelineError {
    /// Short stable label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Ocr(OcrError::Timeout { .. }) => "ocr_timeout",
            PipelineError::Ocr(_) => "ocr",
            PipelineError::Detection(_) => "detection",
            PipelineError::Translation(_) => "translation",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

/// Configuration errors (fatal at startup)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    MissingVariable(&'static str),

    #[error("Environment variable {name} has an invalid value: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid endpoint {name}: {reason}")]
    InvalidEndpoint { name: &'static str, reason: String },

    #[error("Invalid OCR polling config: {0}")]
    InvalidPollConfig(String),

    #[error("Upload limit must be > 0")]
    InvalidUploadLimit,
}

// Convenience type aliases for Results
pub type OcrResult<T> = Result<T, OcrError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
