//! Relay configuration.

use crate::heartbeat::DEFAULT_IDLE_TIMEOUT;
use eventrelay_core::{error::RelayError, framer::FramingConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Outbound stream settings shared by the numeric and string streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletConfig {
    /// Name subscribers resolve the streams by
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    /// Stream content type, also used as each channel's `type`
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Nominal sampling rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Source id prefix; `ml-<hostname>` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Unit tag on numeric channels
    #[serde(default = "default_numeric_unit")]
    pub numeric_unit: String,
    /// Unit tag on string channels
    #[serde(default = "default_string_unit")]
    pub string_unit: String,
}

fn default_stream_name() -> String { "MindLogger".into() }
fn default_content_type() -> String { "live_event".into() }
fn default_sample_rate() -> f64 { 1000.0 }
fn default_numeric_unit() -> String { "pixels".into() }
fn default_string_unit() -> String { "string".into() }

impl Default for OutletConfig {
    fn default() -> Self {
        Self {
            stream_name: default_stream_name(),
            content_type: default_content_type(),
            sample_rate: default_sample_rate(),
            source_id: None,
            numeric_unit: default_numeric_unit(),
            string_unit: default_string_unit(),
        }
    }
}

impl OutletConfig {
    /// The configured source id, or `ml-<hostname>`.
    pub fn resolved_source_id(&self) -> String {
        self.source_id.clone().unwrap_or_else(|| {
            let host = hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".into());
            format!("ml-{host}")
        })
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Interface to listen on ("0.0.0.0" = all)
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Append-only session log path
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Read timeout that triggers a heartbeat
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Bytes requested per read
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
    #[serde(default)]
    pub framing: FramingConfig,
    #[serde(default)]
    pub outlet: OutletConfig,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 5555 }
fn default_log_file() -> PathBuf { PathBuf::from("live_events.log") }
fn default_idle_timeout_ms() -> u64 { DEFAULT_IDLE_TIMEOUT.as_millis() as u64 }
fn default_recv_buffer() -> usize { 4_096 }

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_file: default_log_file(),
            idle_timeout_ms: default_idle_timeout_ms(),
            recv_buffer: default_recv_buffer(),
            framing: FramingConfig::default(),
            outlet: OutletConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RelayError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port`, as passed to the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.recv_buffer == 0 {
            return Err(RelayError::Config("recv_buffer must be > 0".into()));
        }
        if self.idle_timeout_ms == 0 {
            return Err(RelayError::Config("idle_timeout_ms must be > 0".into()));
        }
        if self.framing.delimiter.is_empty() {
            return Err(RelayError::Config("framing.delimiter must not be empty".into()));
        }
        if self.outlet.sample_rate.is_nan() || self.outlet.sample_rate < 0.0 {
            return Err(RelayError::Config("outlet.sample_rate must be >= 0".into()));
        }
        Ok(())
    }
}
