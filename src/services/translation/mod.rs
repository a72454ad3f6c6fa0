pub mod api_client;

use async_trait::async_trait;

use crate::core::errors::{DetectionError, TranslationError};
use crate::core::types::{DetectionResult, TranslationResult};

pub use api_client::TranslatorClient;

/// Best-guess source language for a piece of text
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    async fn detect(&self, text: &str) -> Result<DetectionResult, DetectionError>;
}

/// Text translation between two language codes
#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<TranslationResult, TranslationError>;
}
