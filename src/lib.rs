// Library exports for the image text translation service

// Core modules
pub mod core;
pub mod orchestration;
pub mod server;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{
        ConfigError, DetectionError, OcrError, PipelineError, TranslationError, ValidationError,
    },
    types::{
        DetectionResult, ImageUpload, OcrJob, OperationStatus, PipelineRequest, RecognizedText,
        TranslateForm, TranslationResult, UploadedFile,
    },
};

pub use orchestration::PipelineOrchestrator;

pub use server::{router, AppState};

pub use services::{
    LanguageDetector, PollPolicy, ReadApiClient, TextRecognizer, TextTranslator, TranslatorClient,
};

pub use utils::Metrics;
