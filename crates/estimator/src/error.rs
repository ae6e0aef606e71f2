/// Errors from the estimation service client.
///
/// Every variant is converted to task failure by the worker; the split
/// exists so failure text and logs say *why* -- a rejected image is not
/// a network fault, and a timeout is not a protocol bug.
#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    /// The service rejected the image before starting a job.
    #[error("Estimation service rejected the image: {0}")]
    Validation(String),

    /// Submission or the status stream exceeded its bounded wait.
    #[error("Estimation service timed out: {0}")]
    Timeout(String),

    /// Transport failure: could not connect, or the connection dropped
    /// before a terminal event arrived.
    #[error("Estimation service connection lost: {0}")]
    ConnectionLost(String),

    /// The service spoke, but not the protocol we expect (unparseable
    /// terminal payload, stream ended without a terminal event).
    #[error("Estimation protocol error: {0}")]
    Protocol(String),

    /// The service returned a non-2xx, non-validation status.
    #[error("Estimation service error ({status}): {body}")]
    Api { status: u16, body: String },
}
