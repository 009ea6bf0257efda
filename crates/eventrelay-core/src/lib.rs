//! # eventrelay-core
//!
//! Core types and the per-record pipeline shared by every eventrelay crate.
//!
//! ## Pipeline
//! ```text
//! raw chunk ──► Framer ──► decode_record ──► classify ──► (router, session log)
//!   ("$$$"-separated      (JSON `data`      (numeric / string
//!    JSON objects)          object)           field groups)
//! ```
//!
//! The outbound transport is not implemented here: it is reached through the
//! [`StreamSink`] capability trait, with concrete sinks in `eventrelay-sink`.

pub mod error;
pub mod framer;
pub mod record;
pub mod schema;
pub mod session_log;
pub mod sink;

pub use error::{DecodeError, RelayError, SinkError};
pub use framer::{Framer, FramingConfig, Frames};
pub use record::{decode_record, FieldValue, Record, Scalar};
pub use schema::{classify, Classified, FieldGroup, GroupKind, SchemaFingerprint};
pub use session_log::SessionLog;
pub use sink::{ChannelDesc, ChannelFormat, Sample, StreamHandle, StreamInfo, StreamSink};
