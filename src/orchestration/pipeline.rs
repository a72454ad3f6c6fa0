// Pipeline Orchestrator: validation -> OCR -> language detection -> translation

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{PipelineError, PipelineResult, ValidationError};
use crate::core::types::{
    ImageUpload, PipelineRequest, TranslateForm, TranslationResult, ALLOWED_EXTENSIONS,
    DEFAULT_TARGET_LANGUAGE,
};
use crate::services::{
    build_http_client, LanguageDetector, PollPolicy, ReadApiClient, TextRecognizer,
    TextTranslator, TranslatorClient,
};
use crate::utils::{Metrics, Stage};

/// True when the file name ends in one of the allowed extensions (any case)
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Runs the three upstream stages in strict sequence for one request
pub struct PipelineOrchestrator {
    recognizer: Arc<dyn TextRecognizer>,
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn TextTranslator>,
    metrics: Metrics,
}

impl PipelineOrchestrator {
    /// Wire the Read and Translator clients from configuration
    #[instrument(skip(config, metrics))]
    pub fn new(config: &Config, metrics: Metrics) -> Result<Self> {
        let http_client = build_http_client(config.api.request_timeout)?;

        let recognizer = Arc::new(ReadApiClient::new(
            http_client.clone(),
            &config.api,
            PollPolicy::from_config(&config.ocr),
            Some(metrics.clone()),
        ));
        let translator = Arc::new(TranslatorClient::new(
            http_client,
            &config.api,
            Some(metrics.clone()),
        ));

        info!(
            "Pipeline ready (vision: {}, translator: {}, OCR deadline {:?})",
            config.api.vision_endpoint, config.api.translator_endpoint, config.ocr.timeout
        );

        Ok(Self::with_services(
            recognizer,
            translator.clone(),
            translator,
            metrics,
        ))
    }

    pub fn with_services(
        recognizer: Arc<dyn TextRecognizer>,
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn TextTranslator>,
        metrics: Metrics,
    ) -> Self {
        Self {
            recognizer,
            detector,
            translator,
            metrics,
        }
    }

    /// Check the form without touching any upstream service
    pub fn validate(form: TranslateForm) -> Result<PipelineRequest, ValidationError> {
        let file = form.file.ok_or(ValidationError::MissingFile)?;

        if !allowed_file(&file.filename) {
            return Err(ValidationError::UnsupportedExtension {
                filename: file.filename,
            });
        }
        if file.bytes.is_empty() {
            return Err(ValidationError::EmptyImage);
        }
        match image::guess_format(&file.bytes) {
            Ok(image::ImageFormat::Png | image::ImageFormat::Jpeg | image::ImageFormat::Gif) => {}
            _ => return Err(ValidationError::UnrecognizedImageFormat),
        }

        let target_language = form
            .target_lang
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string());

        Ok(PipelineRequest {
            image: ImageUpload::new(file.bytes),
            target_language,
        })
    }

    /// Validate then execute
    pub async fn run(&self, form: TranslateForm) -> PipelineResult<TranslationResult> {
        let outcome = match Self::validate(form) {
            Ok(request) => self.execute(request).await,
            Err(e) => Err(e.into()),
        };

        match &outcome {
            Ok(_) => self.metrics.record_pipeline_success(),
            Err(e) => {
                warn!("Pipeline failed ({}): {}", e.kind(), e);
                self.metrics.record_pipeline_failure(e.kind());
            }
        }
        outcome
    }

    /// Like `run`, but gives up with `Cancelled` as soon as `cancel` resolves
    pub async fn run_until<F>(&self, form: TranslateForm, cancel: F) -> PipelineResult<TranslationResult>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            outcome = self.run(form) => outcome,
            _ = cancel => {
                warn!("Pipeline cancelled while in flight");
                self.metrics.record_pipeline_failure(PipelineError::Cancelled.kind());
                Err(PipelineError::Cancelled)
            }
        }
    }

    /// OCR, detection and translation; the first failure aborts the rest
    #[instrument(skip(self, request), fields(image_bytes = request.image.len(), target = %request.target_language))]
    pub async fn execute(&self, request: PipelineRequest) -> PipelineResult<TranslationResult> {
        let PipelineRequest {
            image,
            target_language,
        } = request;
        let start_time = Instant::now();

        let stage_start = Instant::now();
        let recognized = self.recognizer.recognize(image).await?;
        self.metrics
            .record_stage_duration(Stage::Ocr, stage_start.elapsed());
        let text = recognized.text();
        debug!("Recognized {} lines ({} chars)", recognized.lines().len(), text.chars().count());

        let stage_start = Instant::now();
        let detection = self.detector.detect(&text).await?;
        self.metrics
            .record_stage_duration(Stage::Detection, stage_start.elapsed());

        let stage_start = Instant::now();
        let translation = self
            .translator
            .translate(&text, &detection.language_code, &target_language)
            .await?;
        self.metrics
            .record_stage_duration(Stage::Translation, stage_start.elapsed());

        info!(
            "Translated {} -> {} in {:.2}s",
            detection.language_code,
            target_language,
            start_time.elapsed().as_secs_f64()
        );
        Ok(translation)
    }
}
