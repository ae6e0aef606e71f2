//! Progress fan-out for mass-estimation tasks.
//!
//! This crate provides the two building blocks of the real-time side of
//! the service:
//!
//! - [`TaskEvent`] -- the three wire shapes every subscriber sees
//!   (`update` / `completed` / `failed`), plus snapshot synthesis so a
//!   persisted record can be replayed in the same shape as a live event.
//! - [`ProgressBroker`] -- per-task-id publish/subscribe groups backed by
//!   `tokio::sync::broadcast`. Best-effort, at-most-once per live
//!   subscriber, no queueing for absent subscribers.

pub mod broker;
pub mod event;

pub use broker::ProgressBroker;
pub use event::TaskEvent;
