pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, Credentials};
pub use errors::{
    ConfigError, DetectionError, OcrError, PipelineError, TranslationError, ValidationError,
};
pub use types::{
    DetectionResult, ImageUpload, OcrJob, OperationStatus, PipelineRequest, RecognizedText,
    TranslateForm, TranslationResult, UploadedFile,
};
