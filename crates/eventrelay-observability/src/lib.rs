//! # eventrelay-observability
//!
//! Structured logging for eventrelay.
//!
//! Human-readable or JSON logs on stderr, with per-component levels, so
//! stdout stays free for the JSON-lines outlet.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
