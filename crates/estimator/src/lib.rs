//! Client for the external mass-estimation ML service.
//!
//! The service exposes a REST endpoint for submitting an image as a
//! long-running job and a per-job WebSocket that streams status events:
//! zero or more monotonic progress updates followed by exactly one
//! terminal event (result or error).
//!
//! Provides typed message parsing, the [`EstimatorClient`] REST/WebSocket
//! implementation, typed error classification (validation vs. timeout vs.
//! connection loss vs. protocol), and the [`Estimator`] trait seam the
//! worker engine depends on.

pub mod client;
pub mod error;
pub mod messages;
pub mod stream;

pub use client::{EstimatorClient, EstimatorConfig, JobHandle};
pub use error::EstimatorError;
pub use stream::{EstimationJob, Estimator, JobEvent};
