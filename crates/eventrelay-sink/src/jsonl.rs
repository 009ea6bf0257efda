//! `JsonLinesSink`: publishes streams as newline-delimited JSON.
//!
//! # Output
//! ```text
//! {"op":"create","stream":1,"info":{"name":"MindLogger",...,"channels":[...]}}
//! {"op":"push","stream":1,"timestamp":0.512,"values":[1.0,2.0,3.0]}
//! {"op":"destroy","stream":1}
//! ```
//!
//! The clock is monotonic seconds since the sink was built.

use eventrelay_core::{
    error::SinkError,
    sink::{Sample, StreamHandle, StreamInfo, StreamSink},
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;
use tracing::debug;

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Line<'a> {
    Create {
        stream: StreamHandle,
        info: &'a StreamInfo,
    },
    Destroy {
        stream: StreamHandle,
    },
    Push {
        stream: StreamHandle,
        timestamp: f64,
        values: &'a Sample,
    },
}

/// JSON-lines sink over any writer.
pub struct JsonLinesSink<W: Write> {
    out: W,
    started: Instant,
    next_handle: u64,
    live: HashMap<StreamHandle, StreamInfo>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: Instant::now(),
            next_handle: 0,
            live: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &Line<'_>, flush: bool) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        if flush {
            self.out.flush()?;
        }
        Ok(())
    }
}

impl<W: Write> StreamSink for JsonLinesSink<W> {
    fn create_stream(&mut self, info: &StreamInfo) -> Result<StreamHandle, SinkError> {
        self.next_handle += 1;
        let handle = StreamHandle(self.next_handle);
        self.emit(&Line::Create { stream: handle, info }, true)?;
        self.live.insert(handle, info.clone());
        debug!("jsonl stream {handle} created ({} channels)", info.channel_count);
        Ok(handle)
    }

    fn destroy_stream(&mut self, handle: StreamHandle) -> Result<(), SinkError> {
        self.live
            .remove(&handle)
            .ok_or(SinkError::UnknownStream { handle: handle.0 })?;
        self.emit(&Line::Destroy { stream: handle }, true)
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
        self.emit(
            &Line::Push {
                stream: handle,
                timestamp,
                values: sample,
            },
            force_immediate,
        )
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
