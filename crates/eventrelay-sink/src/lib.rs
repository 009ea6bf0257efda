//! # eventrelay-sink
//!
//! Concrete [`StreamSink`](eventrelay_core::StreamSink) implementations.
//!
//! - [`MemorySink`]: records every call in memory. Used by tests and by
//!   `eventrelay --dry-run`.
//! - [`JsonLinesSink`]: writes every create/destroy/push as one JSON line
//!   to any `Write` (stdout in the CLI), for piping into downstream tools.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonLinesSink;
pub use memory::{MemorySink, SinkEvent};
