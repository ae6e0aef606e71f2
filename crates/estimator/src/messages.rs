//! Estimation service WebSocket message types and parser.
//!
//! The service sends JSON messages shaped `{"type": "<kind>", "data":
//! {...}}` over the per-job WebSocket. This module deserializes them
//! into a strongly-typed [`EstimatorMessage`] enum.

use serde::Deserialize;

/// All known estimation service WebSocket message types.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EstimatorMessage {
    /// Progress update while the job is running.
    #[serde(rename = "task_status")]
    TaskStatus(StatusData),

    /// The job finished; `result` carries the raw estimation payload.
    #[serde(rename = "task_completed")]
    TaskCompleted(CompletedData),

    /// The job failed on the service side.
    #[serde(rename = "task_failed")]
    TaskFailed(FailedData),
}

/// Payload for `task_status` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    /// Completion fraction in `[0.0, 1.0]`. The service already speaks
    /// fractions; no percent conversion happens anywhere.
    pub progress: f64,
    #[serde(default)]
    pub message: String,
}

/// Payload for `task_completed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedData {
    /// Raw result JSON, normalized into `EstimationResult` by the
    /// stream layer.
    pub result: serde_json::Value,
}

/// Payload for `task_failed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct FailedData {
    pub error: String,
}

/// Parse a raw WebSocket text frame into a typed message.
pub fn parse_message(text: &str) -> Result<EstimatorMessage, serde_json::Error> {
    serde_json::from_str(text)
}
