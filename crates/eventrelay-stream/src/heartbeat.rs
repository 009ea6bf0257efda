//! Heartbeat generator.
//!
//! When a read times out with nothing received, every active stream gets one
//! zero-valued (numeric) or empty-string (string) sample of its current
//! width, so subscribers can tell a quiet sender from a dead relay.
//! Heartbeats never touch stream shape.

use crate::router::StreamRouter;
use eventrelay_core::{
    schema::GroupKind,
    sink::{Sample, StreamSink},
};
use std::time::Duration;
use tracing::{trace, warn};

/// Read timeout of the reference deployment.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(10);

/// The liveness sample for a stream of `kind` with `channels` channels.
pub fn liveness_sample(kind: GroupKind, channels: usize) -> Sample {
    match kind {
        GroupKind::Numeric => Sample::Numeric(vec![0.0; channels]),
        GroupKind::Text => Sample::Text(vec![String::new(); channels]),
    }
}

impl<S: StreamSink> StreamRouter<S> {
    /// Push one liveness sample on every active stream. Returns how many
    /// were accepted.
    pub fn heartbeat(&mut self, timestamp: f64) -> usize {
        let mut pushed = 0;
        for (kind, handle, channels) in self.active_shapes() {
            let sample = liveness_sample(kind, channels);
            match self.sink_mut().push(handle, &sample, timestamp, true) {
                Ok(()) => pushed += 1,
                Err(e) => warn!("Heartbeat on {kind} stream {handle} failed: {e}"),
            }
        }
        if pushed > 0 {
            trace!("heartbeat on {pushed} stream(s) at {timestamp:.3}");
        }
        self.stats_mut().heartbeats += pushed as u64;
        pushed
    }
}
