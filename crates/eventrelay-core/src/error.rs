//! Error types for the eventrelay pipeline.

use thiserror::Error;

/// Errors that can occur while decoding a single framed record.
///
/// Every variant is isolated to the record that produced it; the session
/// keeps running.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// `data` missing, null, or otherwise empty. Dropped silently.
    #[error("Empty payload: `data` is missing or empty")]
    EmptyPayload,

    #[error("`data` must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

impl DecodeError {
    /// Returns `true` for payloads that are dropped without a log line.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::EmptyPayload)
    }
}

/// Errors reported by a [`crate::sink::StreamSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Unknown stream handle {handle}")]
    UnknownStream { handle: u64 },

    #[error("Channel count mismatch: stream has {expected} channels, sample has {got}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("Value type mismatch: stream carries {expected}, sample is {got}")]
    FormatMismatch { expected: String, got: String },

    #[error("Sink rejected operation: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SinkError {
    /// Returns `true` if the sink refused the sample because of its shape.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ChannelMismatch { .. } | Self::FormatMismatch { .. })
    }
}

/// Session-level errors. Only these end the receive loop.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Bind failed on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("Session log error: {0}")]
    Log(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_payload_is_silent() {
        assert!(DecodeError::EmptyPayload.is_silent());
        assert!(!DecodeError::NotAnObject { found: "array" }.is_silent());
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!DecodeError::from(bad).is_silent());
    }

    #[test]
    fn bind_error_names_address() {
        let err = RelayError::Bind {
            addr: "0.0.0.0:5555".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:5555"));
    }

    #[test]
    fn bind_error_reports_os_error_once() {
        use std::error::Error as _;
        let err = RelayError::Bind {
            addr: "0.0.0.0:5555".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        // the OS error is only reachable through the source chain
        assert!(!err.to_string().contains("in use"));
        assert_eq!(err.source().map(|e| e.to_string()), Some("in use".into()));
        let report = error_chain(&err);
        assert_eq!(report.matches("in use").count(), 1);
    }

    fn error_chain(err: &dyn std::error::Error) -> String {
        let mut out = err.to_string();
        let mut next = err.source();
        while let Some(cause) = next {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            next = cause.source();
        }
        out
    }
}
