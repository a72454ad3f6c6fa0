// Request, job and result types flowing through the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target language used when the form leaves `targetLang` empty
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// Extensions accepted on the uploaded file name (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// A file part taken from the multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw inbound form before validation
#[derive(Debug, Clone, Default)]
pub struct TranslateForm {
    pub file: Option<UploadedFile>,
    pub target_lang: Option<String>,
}

/// Image bytes owned by a single pipeline execution.
///
/// Handed to the OCR submission by value, so once submitted the buffer
/// cannot be read again and is dropped as soon as the upload completes.
pub struct ImageUpload {
    bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the upload, yielding the body for the submission request
    pub fn into_body(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageUpload({} bytes)", self.bytes.len())
    }
}

/// Validated request, one per inbound HTTP call
#[derive(Debug)]
pub struct PipelineRequest {
    pub image: ImageUpload,
    pub target_language: String,
}

/// Read API operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl OperationStatus {
    /// Succeeded and Failed never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Succeeded | OperationStatus::Failed)
    }
}

/// A submitted recognition job, polled in place until terminal
#[derive(Debug, Clone)]
pub struct OcrJob {
    pub job_id: String,
    pub status: OperationStatus,
    pub polls: u32,
}

impl OcrJob {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: OperationStatus::NotStarted,
            polls: 0,
        }
    }
}

/// Recognized lines in service order (blocks first, then lines within a block)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizedText {
    lines: Vec<String>,
}

impl RecognizedText {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.is_empty())
    }

    /// Lines concatenated with no separator in between
    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

/// Language detected for the recognized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub language_code: String,
    pub score: Option<f64>,
}

/// Final artifact returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_text_concatenates_without_separator() {
        let text = RecognizedText::from_lines(vec!["Hello".to_string(), "World".to_string()]);
        assert_eq!(text.text(), "HelloWorld");
        assert!(!text.is_empty());
        assert!(RecognizedText::default().is_empty());
    }

    #[test]
    fn test_operation_status_wire_format() {
        let status: OperationStatus = serde_json::from_str("\"notStarted\"").unwrap();
        assert_eq!(status, OperationStatus::NotStarted);
        assert!(!status.is_terminal());
        let status: OperationStatus = serde_json::from_str("\"failed\"").unwrap();
        assert!(status.is_terminal());
    }
}
