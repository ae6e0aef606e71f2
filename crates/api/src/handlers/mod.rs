//! HTTP request handlers.

pub mod tasks;
