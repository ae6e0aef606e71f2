//! Task execution engine.
//!
//! Contains the dispatcher that hands submitted task ids to a bounded
//! pool of workers, and the worker runner that drives one task from
//! `pending` to a terminal state against the external estimation
//! service. Submission is fire-and-forget; callers never wait on
//! external-service latency.

mod dispatcher;
mod runner;

pub use dispatcher::{Dispatcher, Engine};
pub use runner::WorkerError;
