//! Shared domain types for the mass-estimation task service.
//!
//! Pure types and validation only -- no I/O, no internal dependencies.
//! Everything that the store, the worker engine, and the API layer need
//! to agree on lives here: the task state machine, the structured
//! estimation result, and upload validation.

pub mod error;
pub mod estimation;
pub mod task;
pub mod types;
pub mod upload;
