pub mod ocr;
pub mod translation;

use anyhow::{Context, Result};
use std::time::Duration;

// Re-export commonly used services
pub use ocr::{PollPolicy, ReadApiClient, TextRecognizer};
pub use translation::{LanguageDetector, TextTranslator, TranslatorClient};

/// Cognitive Services authentication headers
pub(crate) const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub(crate) const SUBSCRIPTION_REGION_HEADER: &str = "Ocp-Apim-Subscription-Region";

/// Shared HTTP client for all upstream adapters
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create HTTP client")
}
