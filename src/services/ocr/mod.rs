// OCR Service Module - Computer Vision Read API adapter
//
// Submits an image, polls the returned operation until it reaches a terminal
// state and flattens the recognized lines into a single text blob.

pub mod poll;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::core::config::{ApiConfig, Credentials};
use crate::core::errors::{OcrError, OcrResult};
use crate::core::types::{ImageUpload, OcrJob, OperationStatus, RecognizedText};
use crate::services::SUBSCRIPTION_KEY_HEADER;
use crate::utils::Metrics;

pub use poll::PollPolicy;

const OPERATION_LOCATION_HEADER: &str = "Operation-Location";
const READ_API_PATH: &str = "vision/v3.2/read";

/// Anything that turns an image into recognized text
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize printed text. Takes the image by value: it is released once submitted.
    async fn recognize(&self, image: ImageUpload) -> OcrResult<RecognizedText>;
}

/// Read operation result as returned by `analyzeResults/{id}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperationResult {
    status: OperationStatus,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
}

impl ReadOperationResult {
    /// Lines in block order, then line order within each block
    fn into_recognized_text(self) -> RecognizedText {
        let lines = self
            .analyze_result
            .map(|result| {
                result
                    .read_results
                    .into_iter()
                    .flat_map(|block| block.lines.into_iter().map(|line| line.text))
                    .collect()
            })
            .unwrap_or_default();
        RecognizedText::from_lines(lines)
    }
}

/// Job id is the final path segment of the operation location
pub fn job_id_from_location(location: &str) -> OcrResult<String> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    match path.rsplit('/').next().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(OcrError::InvalidOperationLocation(location.to_string())),
    }
}

/// Computer Vision Read API client
pub struct ReadApiClient {
    http_client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
    policy: PollPolicy,
    metrics: Option<Metrics>,
}

impl ReadApiClient {
    pub fn new(
        http_client: reqwest::Client,
        api: &ApiConfig,
        policy: PollPolicy,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            http_client,
            endpoint: api.vision_endpoint.trim_end_matches('/').to_string(),
            credentials: api.credentials.clone(),
            policy,
            metrics,
        }
    }

    /// Upload the image and return the job to poll
    #[instrument(skip(self, image), fields(image_bytes = image.len()))]
    async fn submit(&self, image: ImageUpload) -> OcrResult<OcrJob> {
        let url = format!("{}/{}/analyze", self.endpoint, READ_API_PATH);
        let start = Instant::now();

        let sent = self
            .http_client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.credentials.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.into_body())
            .send()
            .await;
        // The request (and the image it carried) is dropped here.
        debug!("Image buffer released after submission");

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.record_call(false, start.elapsed());
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.record_call(false, start.elapsed());
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(OcrError::UpstreamStatus { status, body });
        }
        self.record_call(true, start.elapsed());

        let location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .ok_or(OcrError::MissingOperationLocation)?
            .to_str()
            .map_err(|e| OcrError::InvalidOperationLocation(e.to_string()))?;

        let job_id = job_id_from_location(location)?;
        debug!("Read operation accepted: {}", job_id);
        Ok(OcrJob::new(job_id))
    }

    /// Single status read for a job
    async fn fetch_status(&self, job_id: &str) -> OcrResult<ReadOperationResult> {
        let url = format!("{}/{}/analyzeResults/{}", self.endpoint, READ_API_PATH, job_id);
        let start = Instant::now();

        let response = match self
            .http_client
            .get(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.credentials.key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.record_call(false, start.elapsed());
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.record_call(false, start.elapsed());
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            return Err(OcrError::UpstreamStatus { status, body });
        }

        let body = response.text().await?;
        self.record_call(true, start.elapsed());

        serde_json::from_str(&body).map_err(|e| OcrError::MalformedResponse(e.to_string()))
    }

    /// Re-read the job until it is terminal. Unbounded on its own; callers wrap it in a deadline.
    async fn wait_for_completion(&self, job: &mut OcrJob) -> OcrResult<ReadOperationResult> {
        let mut delays = self.policy.delays();

        loop {
            let result = self.fetch_status(&job.job_id).await?;
            job.polls += 1;
            job.status = result.status;
            if let Some(ref m) = self.metrics {
                m.record_ocr_poll();
            }

            if job.status.is_terminal() {
                return Ok(result);
            }

            let delay = delays.next().unwrap_or(self.policy.interval);
            debug!(
                "Job {} is {:?} after {} polls, next check in {:?}",
                job.job_id, job.status, job.polls, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn record_call(&self, success: bool, duration: Duration) {
        if let Some(ref m) = self.metrics {
            m.record_upstream_call("ocr", success, duration);
        }
    }
}

#[async_trait]
impl TextRecognizer for ReadApiClient {
    #[instrument(skip(self, image), fields(image_bytes = image.len()))]
    async fn recognize(&self, image: ImageUpload) -> OcrResult<RecognizedText> {
        let mut job = self.submit(image).await?;
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            self.policy.deadline,
            self.wait_for_completion(&mut job),
        )
        .await;

        let result = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Job {} still {:?} after {} polls, giving up",
                    job.job_id, job.status, job.polls
                );
                return Err(OcrError::Timeout {
                    job_id: job.job_id,
                    waited: started.elapsed(),
                });
            }
        };

        match result.status {
            OperationStatus::Succeeded => {
                let text = result.into_recognized_text();
                if text.is_empty() {
                    return Err(OcrError::NoTextRecognized { job_id: job.job_id });
                }
                info!(
                    "Job {} recognized {} lines in {:.2}s",
                    job.job_id,
                    text.lines().len(),
                    started.elapsed().as_secs_f64()
                );
                Ok(text)
            }
            OperationStatus::Failed => {
                warn!("Job {} reported failure", job.job_id);
                Err(OcrError::JobFailed { job_id: job.job_id })
            }
            other => Err(OcrError::MalformedResponse(format!(
                "job {} stopped polling in non-terminal state {:?}",
                job.job_id, other
            ))),
        }
    }
}
