use crate::core::errors::ConfigError;
use reqwest::Url;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const DEFAULT_VISION_ENDPOINT: &str = "https://livetext.cognitiveservices.azure.com/";
const DEFAULT_TRANSLATOR_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com";
/// Upper bound on the per-poll growth factor
const MAX_POLL_BACKOFF: f64 = 10.0;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    pub max_upload_bytes: usize,
}

/// Cognitive Services key and region, sent with every upstream call
#[derive(Clone)]
pub struct Credentials {
    pub key: String,
    pub region: String,
}

// Never print the key, not even at trace level.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Upstream endpoint configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub credentials: Credentials,
    pub vision_endpoint: String,
    pub translator_endpoint: String,
    pub translator_api_version: String,
    pub request_timeout: Duration,
}

/// OCR polling configuration
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Delay before the first status re-check
    pub poll_interval: Duration,
    /// Upper bound for the delay once back-off kicks in
    pub poll_max_interval: Duration,
    /// Interval multiplier per attempt (1.0 = fixed interval)
    pub poll_backoff: f64,
    /// Total time a job may stay non-terminal
    pub timeout: Duration,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub ocr: OcrConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build and validate a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::load(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn load<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = required(lookup, "COG_SERVICE_KEY")?;
        let region = required(lookup, "COG_SERVICE_REGION")?;

        let log_level = lookup("LOG_LEVEL")
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: parsed(lookup, "SERVER_PORT", 5000)?,
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                log_level,
                max_upload_bytes: parsed(lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            },
            api: ApiConfig {
                credentials: Credentials { key, region },
                vision_endpoint: lookup("VISION_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_VISION_ENDPOINT.to_string()),
                translator_endpoint: lookup("TRANSLATOR_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_TRANSLATOR_ENDPOINT.to_string()),
                translator_api_version: lookup("TRANSLATOR_API_VERSION")
                    .unwrap_or_else(|| "3.0".to_string()),
                request_timeout: Duration::from_secs(parsed(lookup, "API_TIMEOUT_SECONDS", 30)?),
            },
            ocr: OcrConfig {
                poll_interval: Duration::from_millis(parsed(lookup, "OCR_POLL_INTERVAL_MS", 1000)?),
                poll_max_interval: Duration::from_millis(parsed(
                    lookup,
                    "OCR_POLL_MAX_INTERVAL_MS",
                    5000,
                )?),
                poll_backoff: parsed(lookup, "OCR_POLL_BACKOFF", 1.0)?,
                timeout: Duration::from_secs(parsed(lookup, "OCR_TIMEOUT_SECONDS", 60)?),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("VISION_ENDPOINT", &self.api.vision_endpoint)?;
        validate_endpoint("TRANSLATOR_ENDPOINT", &self.api.translator_endpoint)?;

        if self.ocr.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollConfig(
                "poll interval must be > 0".to_string(),
            ));
        }
        if self.ocr.poll_max_interval < self.ocr.poll_interval {
            return Err(ConfigError::InvalidPollConfig(format!(
                "max interval {:?} is shorter than interval {:?}",
                self.ocr.poll_max_interval, self.ocr.poll_interval
            )));
        }
        if !self.ocr.poll_backoff.is_finite()
            || !(1.0..=MAX_POLL_BACKOFF).contains(&self.ocr.poll_backoff)
        {
            return Err(ConfigError::InvalidPollConfig(format!(
                "backoff must be between 1.0 and {}, got {}",
                MAX_POLL_BACKOFF, self.ocr.poll_backoff
            )));
        }
        if self.ocr.timeout.is_zero() {
            return Err(ConfigError::InvalidPollConfig(
                "timeout must be > 0".to_string(),
            ));
        }
        if self.ocr.poll_max_interval > self.ocr.timeout {
            return Err(ConfigError::InvalidPollConfig(format!(
                "max interval {:?} exceeds the OCR deadline {:?}",
                self.ocr.poll_max_interval, self.ocr.timeout
            )));
        }

        if self.api.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "API_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_bytes
    }

    pub fn credentials(&self) -> &Credentials {
        &self.api.credentials
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVariable(name))
}

// Unset falls back to the default; set but unparsable is an error.
fn parsed<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

fn validate_endpoint(name: &'static str, endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
        name,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidEndpoint {
            name,
            reason: format!("unsupported scheme {}", other),
        }),
    }
}
