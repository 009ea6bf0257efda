//! In-memory `StreamSink` implementation.
//!
//! Keeps the full call history so tests can assert on exactly which streams
//! were created, destroyed and pushed to. The clock is manual.

use eventrelay_core::{
    error::SinkError,
    sink::{Sample, StreamHandle, StreamInfo, StreamSink},
};
use std::collections::BTreeMap;

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Created {
        handle: StreamHandle,
        info: StreamInfo,
    },
    Destroyed {
        handle: StreamHandle,
    },
    Pushed {
        handle: StreamHandle,
        sample: Sample,
        timestamp: f64,
        force_immediate: bool,
    },
}

/// Recording sink with a settable clock and push fault injection.
#[derive(Debug, Default)]
pub struct MemorySink {
    next_handle: u64,
    live: BTreeMap<StreamHandle, StreamInfo>,
    events: Vec<SinkEvent>,
    clock: f64,
    fail_pushes: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value returned by [`StreamSink::now`].
    pub fn set_time(&mut self, seconds: f64) {
        self.clock = seconds;
    }

    /// Reject the next `n` pushes with [`SinkError::Rejected`].
    pub fn fail_next_pushes(&mut self, n: usize) {
        self.fail_pushes = n;
    }

    /// Full call history, oldest first.
    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    /// Streams that are currently live.
    pub fn live_streams(&self) -> impl Iterator<Item = (StreamHandle, &StreamInfo)> {
        self.live.iter().map(|(h, i)| (*h, i))
    }

    pub fn is_live(&self, handle: StreamHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn info(&self, handle: StreamHandle) -> Option<&StreamInfo> {
        self.live.get(&handle)
    }

    pub fn created_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Created { .. }))
            .count()
    }

    pub fn destroyed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SinkEvent::Destroyed { .. }))
            .count()
    }

    /// Accepted pushes for one stream: `(sample, timestamp)`.
    pub fn pushes_for(&self, handle: StreamHandle) -> Vec<(&Sample, f64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Pushed {
                    handle: h,
                    sample,
                    timestamp,
                    ..
                } if *h == handle => Some((sample, *timestamp)),
                _ => None,
            })
            .collect()
    }

    /// All accepted pushes, in order.
    pub fn pushes(&self) -> Vec<(StreamHandle, &Sample, f64)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Pushed {
                    handle,
                    sample,
                    timestamp,
                    ..
                } => Some((*handle, sample, *timestamp)),
                _ => None,
            })
            .collect()
    }
}

impl StreamSink for MemorySink {
    fn create_stream(&mut self, info: &StreamInfo) -> Result<StreamHandle, SinkError> {
        if info.channels.len() != info.channel_count {
            return Err(SinkError::Rejected(format!(
                "{} channel descriptors for {} channels",
                info.channels.len(),
                info.channel_count
            )));
        }
        self.next_handle += 1;
        let handle = StreamHandle(self.next_handle);
        self.live.insert(handle, info.clone());
        self.events.push(SinkEvent::Created {
            handle,
            info: info.clone(),
        });
        Ok(handle)
    }

    fn destroy_stream(&mut self, handle: StreamHandle) -> Result<(), SinkError> {
        self.live
            .remove(&handle)
            .ok_or(SinkError::UnknownStream { handle: handle.0 })?;
        self.events.push(SinkEvent::Destroyed { handle });
        Ok(())
    }

    fn push(
        &mut self,
        handle: StreamHandle,
        sample: &Sample,
        timestamp: f64,
        force_immediate: bool,
    ) -> Result<(), SinkError> {
        let info = self
            .live
            .get(&handle)
            .ok_or(SinkError::UnknownStream { handle: handle.0 })?;
        sample.check_against(info)?;
        if self.fail_pushes > 0 {
            self.fail_pushes -= 1;
            return Err(SinkError::Rejected("injected push failure".into()));
        }
        self.events.push(SinkEvent::Pushed {
            handle,
            sample: sample.clone(),
            timestamp,
            force_immediate,
        });
        Ok(())
    }

    fn now(&self) -> f64 {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventrelay_core::sink::{ChannelDesc, ChannelFormat};

    fn info(labels: &[&str]) -> StreamInfo {
        StreamInfo {
            name: "MindLogger".into(),
            content_type: "live_event".into(),
            channel_count: labels.len(),
            sample_rate: 1000.0,
            value_type: ChannelFormat::Double64,
            source_id: "ml-test-numeric".into(),
            channels: labels
                .iter()
                .map(|l| ChannelDesc {
                    label: (*l).into(),
                    unit: "pixels".into(),
                    content_type: "live_event".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn create_push_destroy() {
        let mut sink = MemorySink::new();
        sink.set_time(12.5);
        let h = sink.create_stream(&info(&["x", "y"])).unwrap();
        sink.push(h, &Sample::Numeric(vec![1.0, 2.0]), sink.now(), true)
            .unwrap();
        assert_eq!(sink.pushes_for(h), vec![(&Sample::Numeric(vec![1.0, 2.0]), 12.5)]);

        sink.destroy_stream(h).unwrap();
        assert!(!sink.is_live(h));
        assert!(matches!(
            sink.push(h, &Sample::Numeric(vec![1.0, 2.0]), 0.0, true),
            Err(SinkError::UnknownStream { .. })
        ));
    }

    #[test]
    fn rejects_size_mismatch() {
        let mut sink = MemorySink::new();
        let h = sink.create_stream(&info(&["x", "y"])).unwrap();
        let err = sink.push(h, &Sample::Numeric(vec![1.0]), 0.0, true).unwrap_err();
        assert!(err.is_shape_mismatch());
        assert!(sink.pushes().is_empty());
    }

    #[test]
    fn injected_failures_are_consumed() {
        let mut sink = MemorySink::new();
        let h = sink.create_stream(&info(&["x"])).unwrap();
        sink.fail_next_pushes(1);
        assert!(sink.push(h, &Sample::Numeric(vec![1.0]), 0.0, true).is_err());
        assert!(sink.push(h, &Sample::Numeric(vec![1.0]), 0.0, true).is_ok());
        assert_eq!(sink.pushes().len(), 1);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut sink = MemorySink::new();
        let a = sink.create_stream(&info(&["x"])).unwrap();
        sink.destroy_stream(a).unwrap();
        let b = sink.create_stream(&info(&["x"])).unwrap();
        assert_ne!(a, b);
        assert_eq!(sink.created_count(), 2);
        assert_eq!(sink.destroyed_count(), 1);
    }
}
