//! `StreamSink`: the outbound labeled multi-channel streaming capability.
//!
//! The relay never talks to a streaming transport directly. It needs exactly
//! four operations: create a stream, destroy it, push one sample, and read
//! the transport clock. Concrete sinks live in `eventrelay-sink`.

use crate::error::SinkError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a stream created by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamHandle(pub u64);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-channel value type of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    Double64,
    String,
}

impl fmt::Display for ChannelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelFormat::Double64 => write!(f, "double64"),
            ChannelFormat::String => write!(f, "string"),
        }
    }
}

/// Channel metadata descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDesc {
    pub label: String,
    /// Descriptive tag only ("pixels", "string")
    pub unit: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Everything a sink needs to stand up a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Name subscribers discover the stream by
    pub name: String,
    pub content_type: String,
    pub channel_count: usize,
    /// Nominal rate in Hz
    pub sample_rate: f64,
    pub value_type: ChannelFormat,
    pub source_id: String,
    /// One descriptor per channel, in channel order
    pub channels: Vec<ChannelDesc>,
}

impl StreamInfo {
    /// Channel labels in channel order.
    pub fn labels(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.label.as_str()).collect()
    }
}

/// One multi-channel sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Sample {
    pub fn len(&self) -> usize {
        match self {
            Sample::Numeric(v) => v.len(),
            Sample::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> ChannelFormat {
        match self {
            Sample::Numeric(_) => ChannelFormat::Double64,
            Sample::Text(_) => ChannelFormat::String,
        }
    }

    /// Check a sample against the stream it is about to be pushed on.
    /// Sinks call this before accepting a push.
    pub fn check_against(&self, info: &StreamInfo) -> Result<(), SinkError> {
        if self.format() != info.value_type {
            return Err(SinkError::FormatMismatch {
                expected: info.value_type.to_string(),
                got: self.format().to_string(),
            });
        }
        if self.len() != info.channel_count {
            return Err(SinkError::ChannelMismatch {
                expected: info.channel_count,
                got: self.len(),
            });
        }
        Ok(())
    }
}

/// The outbound streaming transport.
///
/// Implementations are driven from a single receive loop and therefore
/// only need `&mut self`; no internal locking is expected.
pub trait StreamSink {
    /// Stand up a new stream and return its handle.
    fn create_stream(&mut self, info: &StreamInfo) -> Result<StreamHandle, SinkError>;

    /// Tear a stream down. The handle is invalid afterwards.
    fn destroy_stream(&mut self, handle: StreamHandle) -> Result<(), SinkError>;

    /// Push one sample. `force_immediate` asks the transport not to buffer.
    /// `timestamp` is authoritative and must not be re-stamped.
    fn push(
        &mut self,
        handle: StreamHandle,
        sample: &Sample,
        timestamp: f64,
        force_immediate: bool,
    ) -> Result<(), SinkError>;

    /// Transport clock, in seconds.
    fn now(&self) -> f64;
}

impl<S: StreamSink + ?Sized> StreamSink for &mut S {
    fn create_stream(&mut self, info: &StreamInfo) -> Result<StreamHandle, SinkError> {
        (**self).create_stream(info)
    }

    fn destroy_stream(&mut self, handle: StreamHandle) -> Result<(), SinkError> {
        (**self).destroy_stream(handle)
    }

    fn push(
        &mut self,
        handle: StreamHandle,
        sample: &Sample,
        timestamp: f64,
        force_immediate: bool,
    ) -> Result<(), SinkError> {
        (**self).push(handle, sample, timestamp, force_immediate)
    }

    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<S: StreamSink + ?Sized> StreamSink for Box<S> {
    fn create_stream(&mut self, info: &StreamInfo) -> Result<StreamHandle, SinkError> {
        (**self).create_stream(info)
    }

    fn destroy_stream(&mut self, handle: StreamHandle) -> Result<(), SinkError> {
        (**self).destroy_stream(handle)
    }

    fn push(
        &mut self,
        handle: StreamHandle,
        sample: &Sample,
        timestamp: f64,
        force_immediate: bool,
    ) -> Result<(), SinkError> {
        (**self).push(handle, sample, timestamp, force_immediate)
    }

    fn now(&self) -> f64 {
        (**self).now()
    }
}
