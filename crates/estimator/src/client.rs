//! REST + WebSocket client for the estimation service.
//!
//! [`EstimatorClient`] submits images over HTTP multipart and opens the
//! per-job WebSocket status stream. Both operations are bounded: the
//! HTTP client carries a submit timeout, and the stream applies the
//! event timeout to every read.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_tungstenite::connect_async;

use mealscan_core::upload::ImageUpload;

use crate::error::EstimatorError;
use crate::stream::{EstimationJob, Estimator, WsJob};

/// Default bounded wait for job submission.
const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bounded wait between status events.
const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection configuration for the estimation service.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// HTTP base URL, e.g. `http://localhost:8001`.
    pub api_url: String,
    /// WebSocket base URL, e.g. `ws://localhost:8001`.
    pub ws_url: String,
    /// Bounded wait for the submission round trip.
    pub submit_timeout: Duration,
    /// Bounded wait for each status event; exceeding it fails the job.
    pub event_timeout: Duration,
}

impl EstimatorConfig {
    /// Build a config from the HTTP base URL, deriving the WebSocket
    /// URL by scheme substitution (the service serves both on one port).
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        let ws_url = api_url
            .replacen("https", "wss", 1)
            .replacen("http", "ws", 1);
        Self {
            api_url,
            ws_url,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
        }
    }
}

/// Server-assigned handle for a submitted estimation job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
}

/// Response returned by the `estimate_async` endpoint after queueing.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

/// Error body the service sends on rejection.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Production estimation service client.
pub struct EstimatorClient {
    http: reqwest::Client,
    config: EstimatorConfig,
}

impl EstimatorClient {
    /// Create a client for the configured service.
    ///
    /// Panics only if the underlying HTTP client cannot be constructed,
    /// which indicates a broken TLS environment and should fail startup.
    pub fn new(config: EstimatorConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.submit_timeout)
            .build()
            .expect("Failed to build HTTP client");
        Self { http, config }
    }

    /// HTTP base URL of the service.
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// Extract a service-provided error message from a response body,
    /// falling back to the raw text.
    async fn error_detail(response: reqwest::Response) -> String {
        let raw = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        match serde_json::from_str::<ErrorBody>(&raw) {
            Ok(body) => body.detail,
            Err(_) => raw,
        }
    }
}

#[async_trait]
impl Estimator for EstimatorClient {
    async fn submit(&self, upload: &ImageUpload) -> Result<JobHandle, EstimatorError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(
                upload
                    .filename
                    .clone()
                    .unwrap_or_else(|| "upload".to_string()),
            )
            .mime_str(&upload.content_type)
            .map_err(|e| EstimatorError::Validation(format!("Invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/api/v1/estimate_async", self.config.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EstimatorError::Timeout(format!(
                        "Submission exceeded {}s",
                        self.config.submit_timeout.as_secs()
                    ))
                } else {
                    EstimatorError::ConnectionLost(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            // The service inspected the image and said no -- surface
            // this distinctly from transport failure.
            return Err(EstimatorError::Validation(
                Self::error_detail(response).await,
            ));
        }
        if !status.is_success() {
            return Err(EstimatorError::Api {
                status: status.as_u16(),
                body: Self::error_detail(response).await,
            });
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| EstimatorError::Protocol(format!("Malformed submit response: {e}")))?;

        tracing::info!(job_id = %submitted.task_id, "Estimation job submitted");

        Ok(JobHandle {
            job_id: submitted.task_id,
        })
    }

    async fn watch(&self, handle: &JobHandle) -> Result<Box<dyn EstimationJob>, EstimatorError> {
        let url = format!("{}/api/v1/ws/task/{}", self.config.ws_url, handle.job_id);

        let connect = connect_async(&url);
        let (ws_stream, _response) = tokio::time::timeout(self.config.submit_timeout, connect)
            .await
            .map_err(|_| {
                EstimatorError::Timeout(format!(
                    "WebSocket connect to {} exceeded {}s",
                    url,
                    self.config.submit_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                EstimatorError::ConnectionLost(format!("Failed to connect to {url}: {e}"))
            })?;

        tracing::info!(job_id = %handle.job_id, "Watching estimation job status stream");

        Ok(Box::new(WsJob::new(
            ws_stream,
            self.config.event_timeout,
            handle.job_id.clone(),
        )))
    }
}
