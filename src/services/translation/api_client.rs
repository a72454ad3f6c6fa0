// Translator Text API client: language detection and translation
//
// Both calls send a one-element batch of `{text}` objects and read the
// first element of the returned batch.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{LanguageDetector, TextTranslator};
use crate::core::config::{ApiConfig, Credentials};
use crate::core::errors::{DetectionError, TranslationError};
use crate::core::types::{DetectionResult, TranslationResult};
use crate::services::{SUBSCRIPTION_KEY_HEADER, SUBSCRIPTION_REGION_HEADER};
use crate::utils::Metrics;

const CLIENT_TRACE_ID_HEADER: &str = "X-ClientTraceId";

/// Translator client shared by the detection and translation stages
pub struct TranslatorClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_version: String,
    credentials: Credentials,
    metrics: Option<Metrics>,
}

#[derive(Debug, Serialize)]
struct TextItem<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedItem {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TranslatedItem {
    #[serde(default)]
    translations: Vec<TranslationItem>,
}

#[derive(Debug, Deserialize)]
struct TranslationItem {
    #[serde(default)]
    text: Option<String>,
}

/// Transport-level failure shared by both calls
#[derive(Debug)]
enum CallFailure {
    Request(reqwest::Error),
    Status { status: StatusCode, body: String },
}

impl From<CallFailure> for DetectionError {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Request(e) => DetectionError::Request(e),
            CallFailure::Status { status, body } => DetectionError::UpstreamStatus { status, body },
        }
    }
}

impl From<CallFailure> for TranslationError {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Request(e) => TranslationError::Request(e),
            CallFailure::Status { status, body } => {
                TranslationError::UpstreamStatus { status, body }
            }
        }
    }
}

impl TranslatorClient {
    pub fn new(http_client: reqwest::Client, api: &ApiConfig, metrics: Option<Metrics>) -> Self {
        Self {
            http_client,
            endpoint: api.translator_endpoint.trim_end_matches('/').to_string(),
            api_version: api.translator_api_version.clone(),
            credentials: api.credentials.clone(),
            metrics,
        }
    }

    /// POST a single-text batch and return the raw response body
    async fn post_text(
        &self,
        service: &'static str,
        path: &str,
        query: &[(&str, &str)],
        text: &str,
        trace_id: Option<&str>,
    ) -> Result<String, CallFailure> {
        let url = format!("{}/{}", self.endpoint, path);
        let start = Instant::now();

        let mut request = self
            .http_client
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .query(query)
            .header(SUBSCRIPTION_KEY_HEADER, &self.credentials.key)
            .header(SUBSCRIPTION_REGION_HEADER, &self.credentials.region)
            .json(&[TextItem { text }]);
        if let Some(trace_id) = trace_id {
            request = request.header(CLIENT_TRACE_ID_HEADER, trace_id);
        }

        let result = async move {
            let response = request.send().await.map_err(CallFailure::Request)?;
            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
                return Err(CallFailure::Status { status, body });
            }
            response.text().await.map_err(CallFailure::Request)
        }
        .await;

        self.record_call(service, result.is_ok(), start.elapsed());
        if let Err(ref failure) = result {
            warn!("{} call failed: {:?}", service, failure);
        }
        result
    }

    fn record_call(&self, service: &'static str, success: bool, duration: Duration) {
        if let Some(ref m) = self.metrics {
            m.record_upstream_call(service, success, duration);
        }
    }
}

fn parse_detection(body: &str) -> Result<DetectionResult, DetectionError> {
    let items: Vec<DetectedItem> = serde_json::from_str(body)
        .map_err(|e| DetectionError::MalformedResponse(e.to_string()))?;
    let first = items
        .into_iter()
        .next()
        .ok_or_else(|| DetectionError::MalformedResponse("empty result batch".to_string()))?;
    let language_code = first
        .language
        .filter(|code| !code.trim().is_empty())
        .ok_or(DetectionError::MissingField("language"))?;

    Ok(DetectionResult {
        language_code,
        score: first.score,
    })
}

fn parse_translation(body: &str) -> Result<TranslationResult, TranslationError> {
    let items: Vec<TranslatedItem> = serde_json::from_str(body)
        .map_err(|e| TranslationError::MalformedResponse(e.to_string()))?;
    let first = items
        .into_iter()
        .next()
        .ok_or_else(|| TranslationError::MalformedResponse("empty result batch".to_string()))?;
    let translated_text = first
        .translations
        .into_iter()
        .next()
        .ok_or(TranslationError::MissingField("translations"))?
        .text
        .ok_or(TranslationError::MissingField("translations[0].text"))?;

    Ok(TranslationResult { translated_text })
}

#[async_trait]
impl LanguageDetector for TranslatorClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn detect(&self, text: &str) -> Result<DetectionResult, DetectionError> {
        let body = self.post_text("detect", "detect", &[], text, None).await?;
        let detection = parse_detection(&body)?;
        debug!(
            "Source language is {} (score {:?})",
            detection.language_code, detection.score
        );
        Ok(detection)
    }
}

#[async_trait]
impl TextTranslator for TranslatorClient {
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<TranslationResult, TranslationError> {
        // Fresh id per call so the service can correlate this exact request
        let trace_id = Uuid::new_v4().to_string();
        debug!("Translating {} -> {} (trace {})", source_language, target_language, trace_id);

        let body = self
            .post_text(
                "translate",
                "translate",
                &[("from", source_language), ("to", target_language)],
                text,
                Some(trace_id.as_str()),
            )
            .await?;
        parse_translation(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{api_config, MockScript};
    use serde_json::json;

    fn client(base_url: &str) -> TranslatorClient {
        TranslatorClient::new(reqwest::Client::new(), &api_config(base_url), None)
    }

    #[test]
    fn test_parse_detection() {
        let detection = parse_detection(
            r#"[{"language":"fr","score":1.0,"isTranslationSupported":true,"isTransliterationSupported":false}]"#,
        )
        .unwrap();
        assert_eq!(detection.language_code, "fr");
        assert_eq!(detection.score, Some(1.0));

        assert!(matches!(parse_detection(""), Err(DetectionError::MalformedResponse(_))));
        assert!(matches!(parse_detection("[]"), Err(DetectionError::MalformedResponse(_))));
        assert!(matches!(
            parse_detection(r#"[{"score":0.5}]"#),
            Err(DetectionError::MissingField("language"))
        ));
    }

    #[test]
    fn test_parse_translation() {
        let result = parse_translation(r#"[{"translations":[{"text":"Hello","to":"en"}]}]"#).unwrap();
        assert_eq!(result.translated_text, "Hello");

        assert!(matches!(
            parse_translation(r#"{"error":{"code":401000}}"#),
            Err(TranslationError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_translation(r#"[{"translations":[]}]"#),
            Err(TranslationError::MissingField("translations"))
        ));
        assert!(matches!(
            parse_translation(r#"[{"translations":[{"to":"en"}]}]"#),
            Err(TranslationError::MissingField(_))
        ));
    }

    #[tokio::test]
    async fn test_detect_sends_batch_and_credentials() {
        let mock = MockScript::default().spawn().await;

        let detection = client(&mock.base_url).detect("Bonjour").await.unwrap();

        assert_eq!(detection.language_code, "fr");
        assert_eq!(mock.recorded.detect_texts(), vec!["Bonjour"]);
        let params = mock.recorded.detect_params();
        assert_eq!(params[0].get("api-version").map(String::as_str), Some("3.0"));
        assert_eq!(mock.recorded.regions(), vec!["westeurope"]);
    }

    #[tokio::test]
    async fn test_detect_bad_status() {
        let mock = MockScript {
            detect_status: 401,
            detect_body: json!({"error": {"code": 401000, "message": "bad key"}}),
            ..MockScript::default()
        }
        .spawn()
        .await;

        let err = client(&mock.base_url).detect("Bonjour").await.unwrap_err();
        assert!(matches!(err, DetectionError::UpstreamStatus { status, .. } if status.as_u16() == 401));
    }

    #[tokio::test]
    async fn test_translate_uses_query_params() {
        let mock = MockScript::default().spawn().await;

        let result = client(&mock.base_url)
            .translate("Bonjour", "fr", "en")
            .await
            .unwrap();

        assert_eq!(result.translated_text, "Hello");
        let params = mock.recorded.translate_params();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].get("from").map(String::as_str), Some("fr"));
        assert_eq!(params[0].get("to").map(String::as_str), Some("en"));
        assert_eq!(params[0].get("api-version").map(String::as_str), Some("3.0"));
    }

    #[tokio::test]
    async fn test_translate_trace_id_is_fresh_per_call() {
        let mock = MockScript::default().spawn().await;
        let client = client(&mock.base_url);

        for _ in 0..3 {
            client.translate("Bonjour", "fr", "en").await.unwrap();
        }

        let ids = mock.recorded.trace_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| Uuid::parse_str(id).is_ok()));
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
    }

    #[tokio::test]
    async fn test_translate_missing_field() {
        let mock = MockScript {
            translate_body: json!([{"detectedLanguage": {"language": "fr"}}]),
            ..MockScript::default()
        }
        .spawn()
        .await;

        let err = client(&mock.base_url)
            .translate("Bonjour", "fr", "en")
            .await
            .unwrap_err();
        assert!(matches!(err, TranslationError::MissingField("translations")));
    }
}
