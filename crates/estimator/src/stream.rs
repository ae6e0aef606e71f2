//! The estimator seam and the live WebSocket status stream.
//!
//! [`Estimator`] is the trait the worker engine drives; the production
//! implementation is [`EstimatorClient`](crate::client::EstimatorClient).
//! [`WsJob`] reads the per-job WebSocket, parses frames into typed
//! events, and enforces the bounded-wait contract: every read is under
//! a timeout, and a stream that closes without a terminal event is a
//! typed error, never silence.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use mealscan_core::estimation::EstimationResult;
use mealscan_core::upload::ImageUpload;

use crate::client::JobHandle;
use crate::error::EstimatorError;
use crate::messages::{parse_message, EstimatorMessage};

/// One typed event from a running estimation job.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Monotonic progress fraction plus a human-readable message.
    Progress { progress: f64, message: String },
    /// Terminal: the job produced a normalized result.
    Completed { result: EstimationResult },
    /// Terminal: the job failed on the service side.
    Failed { error: String },
}

/// A live estimation job whose status events can be pulled one at a
/// time. Yields zero or more `Progress` events followed by exactly one
/// terminal event; after that (or after any error) it must not be
/// polled again.
#[async_trait]
pub trait EstimationJob: Send {
    async fn next_event(&mut self) -> Result<JobEvent, EstimatorError>;
}

/// The external-estimation-service seam the worker engine depends on.
///
/// Trait rather than concrete client so engine tests can script the
/// service's behaviour without a network.
#[async_trait]
pub trait Estimator: Send + Sync {
    /// Submit an image as a long-running job.
    ///
    /// Fails with [`EstimatorError::Validation`] when the service
    /// rejects the image, distinctly from transport failure.
    async fn submit(&self, upload: &ImageUpload) -> Result<JobHandle, EstimatorError>;

    /// Open the status stream for a submitted job.
    async fn watch(&self, handle: &JobHandle) -> Result<Box<dyn EstimationJob>, EstimatorError>;
}

/// WebSocket-backed [`EstimationJob`].
pub struct WsJob {
    ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    event_timeout: std::time::Duration,
    job_id: String,
    done: bool,
}

impl WsJob {
    pub(crate) fn new(
        ws_stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
        event_timeout: std::time::Duration,
        job_id: String,
    ) -> Self {
        Self {
            ws_stream,
            event_timeout,
            job_id,
            done: false,
        }
    }
}

#[async_trait]
impl EstimationJob for WsJob {
    async fn next_event(&mut self) -> Result<JobEvent, EstimatorError> {
        if self.done {
            return Err(EstimatorError::Protocol(
                "Status stream already ended".to_string(),
            ));
        }

        loop {
            let frame = tokio::time::timeout(self.event_timeout, self.ws_stream.next())
                .await
                .map_err(|_| {
                    self.done = true;
                    EstimatorError::Timeout(format!(
                        "No status event within {}s for job {}",
                        self.event_timeout.as_secs(),
                        self.job_id
                    ))
                })?;

            match frame {
                Some(Ok(Message::Text(text))) => match parse_message(&text) {
                    Ok(EstimatorMessage::TaskStatus(data)) => {
                        return Ok(JobEvent::Progress {
                            progress: data.progress,
                            message: data.message,
                        });
                    }
                    Ok(EstimatorMessage::TaskCompleted(data)) => {
                        self.done = true;
                        let result = EstimationResult::from_raw(data.result)
                            .map_err(|e| EstimatorError::Protocol(e.to_string()))?;
                        return Ok(JobEvent::Completed { result });
                    }
                    Ok(EstimatorMessage::TaskFailed(data)) => {
                        self.done = true;
                        return Ok(JobEvent::Failed { error: data.error });
                    }
                    Err(e) => {
                        // Unknown message kinds are skipped, not fatal:
                        // the service may add frames we do not consume.
                        tracing::warn!(
                            job_id = %self.job_id,
                            error = %e,
                            raw_message = %text,
                            "Unparseable estimation service message",
                        );
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {}
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    self.done = true;
                    return Err(EstimatorError::ConnectionLost(format!(
                        "Service closed the stream before a terminal event (frame: {frame:?})"
                    )));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Err(EstimatorError::ConnectionLost(e.to_string()));
                }
                None => {
                    self.done = true;
                    return Err(EstimatorError::ConnectionLost(
                        "Stream ended before a terminal event".to_string(),
                    ));
                }
            }
        }
    }
}
