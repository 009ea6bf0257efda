//! `Session`: the single-connection receive loop.
//!
//! One task owns the connection, the framer, both stream slots and the log.
//! Each iteration is one read bounded by the idle timeout:
//!
//! - data    → frame, decode, log, route (in read order)
//! - timeout → heartbeat on every active stream
//! - EOF     → session ends
//!
//! Per-record failures never end the loop.

use crate::config::RelayConfig;
use crate::router::StreamRouter;
use eventrelay_core::{
    error::{DecodeError, RelayError},
    framer::Framer,
    record::decode_record,
    session_log::SessionLog,
    sink::StreamSink,
};
use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, trace, warn};

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub chunks_read: u64,
    pub chunks_skipped: u64,
    pub frames_dropped: u64,
    pub records_decoded: u64,
    pub decode_errors: u64,
    pub empty_payloads: u64,
    pub records_logged: u64,
    pub log_errors: u64,
    pub heartbeats: u64,
    pub push_errors: u64,
    pub streams_created: u64,
    pub streams_destroyed: u64,
}

/// Why the receive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the connection.
    PeerClosed,
    /// The shutdown future completed (e.g. Ctrl-C).
    Interrupted,
}

pub struct Session<R, S: StreamSink, W: Write> {
    conn: R,
    framer: Framer,
    router: StreamRouter<S>,
    log: SessionLog<W>,
    idle_timeout: Duration,
    buf: Vec<u8>,
    metrics: SessionMetrics,
}

impl<R, S, W> Session<R, S, W>
where
    R: AsyncRead + Unpin,
    S: StreamSink,
    W: Write,
{
    pub fn new(conn: R, router: StreamRouter<S>, log: SessionLog<W>, config: &RelayConfig) -> Self {
        Self {
            conn,
            framer: Framer::new(config.framing.clone()),
            router,
            log,
            idle_timeout: config.idle_timeout(),
            buf: vec![0u8; config.recv_buffer.max(1)],
            metrics: SessionMetrics::default(),
        }
    }

    pub fn router(&self) -> &StreamRouter<S> {
        &self.router
    }

    pub fn log(&self) -> &SessionLog<W> {
        &self.log
    }

    /// Snapshot of the session counters, including the router's.
    pub fn metrics(&self) -> SessionMetrics {
        let stats = self.router.stats();
        SessionMetrics {
            heartbeats: stats.heartbeats,
            push_errors: stats.push_errors,
            streams_created: stats.streams_created,
            streams_destroyed: stats.streams_destroyed,
            ..self.metrics
        }
    }

    /// Run until the peer disconnects or a read fails.
    pub async fn run(&mut self) -> Result<SessionEnd, RelayError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until the peer disconnects, a read fails, or `shutdown` completes.
    pub async fn run_until<F: Future>(&mut self, shutdown: F) -> Result<SessionEnd, RelayError> {
        tokio::pin!(shutdown);
        loop {
            let read = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(SessionEnd::Interrupted);
                }
                read = tokio::time::timeout(self.idle_timeout, self.conn.read(&mut self.buf)) => read,
            };

            match read {
                Err(_elapsed) => {
                    self.handle_idle();
                }
                Ok(Ok(0)) => {
                    info!("Connection closed by peer");
                    return Ok(SessionEnd::PeerClosed);
                }
                Ok(Ok(n)) => {
                    let timestamp = self.router.now();
                    let chunk = String::from_utf8_lossy(&self.buf[..n]).into_owned();
                    self.handle_chunk(&chunk, timestamp);
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => {
                    error!("Read failed: {e}");
                    return Err(RelayError::Read(e));
                }
            }
        }
    }

    /// Process one received chunk. All records in it share `timestamp`.
    pub fn handle_chunk(&mut self, chunk: &str, timestamp: f64) {
        let Self {
            framer,
            router,
            log,
            metrics,
            ..
        } = self;
        metrics.chunks_read += 1;

        let mut frames = framer.frames(chunk);
        if frames.skipped() {
            metrics.chunks_skipped += 1;
            trace!("chunk of {} bytes skipped by pre-filter", chunk.len());
            return;
        }
        for text in frames.by_ref() {
            dispatch_record(router, log, metrics, text, timestamp);
        }
        metrics.frames_dropped += frames.dropped() as u64;
    }

    /// Read timed out: pulse every active stream.
    pub fn handle_idle(&mut self) -> usize {
        let now = self.router.now();
        self.router.heartbeat(now)
    }

    /// Orderly shutdown: flush the log and release both streams.
    pub fn close(mut self) -> SessionMetrics {
        if let Err(e) = self.log.flush() {
            error!("Failed to flush session log: {e}");
        }
        self.router.release_all();
        let m = self.metrics();
        info!(
            "Session closed: decoded={} logged={} decode_errors={} dropped_frames={} heartbeats={} push_errors={} streams_created={}",
            m.records_decoded,
            m.records_logged,
            m.decode_errors,
            m.frames_dropped,
            m.heartbeats,
            m.push_errors,
            m.streams_created
        );
        m
    }
}

fn dispatch_record<S: StreamSink, W: Write>(
    router: &mut StreamRouter<S>,
    log: &mut SessionLog<W>,
    metrics: &mut SessionMetrics,
    text: &str,
    timestamp: f64,
) {
    let record = match decode_record(text) {
        Ok(record) => record,
        Err(DecodeError::EmptyPayload) => {
            metrics.empty_payloads += 1;
            return;
        }
        Err(e) => {
            metrics.decode_errors += 1;
            warn!("Decoding error: {e}");
            return;
        }
    };
    metrics.records_decoded += 1;

    match log.append(&record) {
        Ok(()) => metrics.records_logged += 1,
        Err(e) => {
            metrics.log_errors += 1;
            error!("{}", RelayError::Log(e));
        }
    }

    let outcome = router.route(&record, timestamp);
    debug!(
        "record with {} field(s) routed: pushed={} rebuilt={} failed={}",
        record.len(),
        outcome.pushed,
        outcome.rebuilt,
        outcome.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::StreamTemplate;
    use eventrelay_core::schema::GroupKind;
    use eventrelay_core::sink::Sample;
    use eventrelay_sink::MemorySink;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWriteExt, ReadBuf};

    /// A connection whose every read fails.
    struct ResetConn;

    impl AsyncRead for ResetConn {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")))
        }
    }

    fn session<'a>(
        sink: &'a mut MemorySink,
        log: &'a mut Vec<u8>,
    ) -> Session<tokio::io::Empty, &'a mut MemorySink, &'a mut Vec<u8>> {
        Session::new(
            tokio::io::empty(),
            StreamRouter::new(sink, StreamTemplate::default()),
            SessionLog::new(log),
            &RelayConfig::default(),
        )
    }

    #[test]
    fn chunk_with_two_records_and_garbage() {
        let mut sink = MemorySink::new();
        let mut log = Vec::new();
        let mut s = session(&mut sink, &mut log);

        let chunk = concat!(
            r#"{"type":"live_event","data":{"x":1}}$$$"#,
            r#"{"type":"live_event","data":{}}$$$"#,
            r#"{"type":"live_event","data":{"x":2"}$$$"#,
            r#"{"type":"live_event","data":{"x":3}}$$$"#,
            r#"{"type":"live_ev"#,
        );
        s.handle_chunk(chunk, 1.0);

        let m = s.metrics();
        assert_eq!(m.records_decoded, 2);
        assert_eq!(m.empty_payloads, 1);
        assert_eq!(m.decode_errors, 1);
        assert_eq!(m.frames_dropped, 1);
        assert_eq!(m.records_logged, 2);
        let handle = s.router().active(GroupKind::Numeric).unwrap().handle();
        assert_eq!(s.router().sink().pushes_for(handle).len(), 2);

        s.close();
        assert_eq!(String::from_utf8(log).unwrap(), "[1]\n[3]\n");
        assert_eq!(sink.live_streams().count(), 0);
    }

    #[test]
    fn chunk_without_marker_is_ignored() {
        let mut sink = MemorySink::new();
        let mut log = Vec::new();
        let mut s = session(&mut sink, &mut log);
        s.handle_chunk(r#"{"data":{"x":1}}$$$"#, 1.0);
        assert_eq!(s.metrics().chunks_skipped, 1);
        assert_eq!(s.metrics().records_decoded, 0);
    }

    #[test]
    fn push_failure_is_still_logged() {
        let mut sink = MemorySink::new();
        sink.fail_next_pushes(10);
        let mut log = Vec::new();
        let mut s = session(&mut sink, &mut log);
        s.handle_chunk(r#"{"type":"live_event","data":{"label":"x"}}$$$"#, 1.0);
        assert_eq!(s.metrics().push_errors, 1);
        s.close();
        assert_eq!(String::from_utf8(log).unwrap(), "['x']\n");
    }

    #[tokio::test]
    async fn idle_read_emits_heartbeats_until_peer_closes() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut sink = MemorySink::new();
        let mut log = Vec::new();
        let mut s = Session::new(
            server,
            StreamRouter::new(&mut sink, StreamTemplate::default()),
            SessionLog::new(&mut log),
            &RelayConfig::default(),
        );

        let writer = async move {
            client
                .write_all(br#"{"type":"live_event","data":{"x":1,"y":2}}$$$"#)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(60)).await;
            drop(client);
        };
        let (end, ()) = tokio::join!(s.run(), writer);
        assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
        assert!(s.metrics().heartbeats >= 1);
        s.close();

        let pushes = sink.pushes();
        assert_eq!(pushes[0].1, &Sample::Numeric(vec![1.0, 2.0]));
        assert!(pushes[1..]
            .iter()
            .all(|(_, sample, _)| *sample == &Sample::Numeric(vec![0.0, 0.0])));
    }

    #[tokio::test]
    async fn shutdown_future_interrupts() {
        let (_client, server) = tokio::io::duplex(64);
        let mut sink = MemorySink::new();
        let mut log = Vec::new();
        let mut s = Session::new(
            server,
            StreamRouter::new(&mut sink, StreamTemplate::default()),
            SessionLog::new(&mut log),
            &RelayConfig::default(),
        );
        let end = s
            .run_until(tokio::time::sleep(Duration::from_millis(30)))
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::Interrupted);
        // no stream was ever active, so every timeout was a no-op
        assert_eq!(s.metrics().heartbeats, 0);
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut sink = MemorySink::new();
        let mut log = Vec::new();
        let mut s = Session::new(
            server,
            StreamRouter::new(&mut sink, StreamTemplate::default()),
            SessionLog::new(&mut log),
            &RelayConfig::default(),
        );

        let mut bytes = br#"{"type":"live_event","data":{"x":1,"label":"caf"#.to_vec();
        bytes.push(0xC3);
        bytes.extend_from_slice(br#""}}$$$"#);
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        let writer = async move {
            client.write_all(&bytes).await.unwrap();
            drop(client);
        };
        let (end, ()) = tokio::join!(s.run(), writer);
        assert_eq!(end.unwrap(), SessionEnd::PeerClosed);

        let m = s.close();
        assert_eq!(m.records_logged, 1);
        assert_eq!(m.decode_errors, 0);
        // the trailing invalid bytes form a fragment without a closing brace
        assert_eq!(m.frames_dropped, 1);

        let texts: Vec<_> = sink
            .pushes()
            .into_iter()
            .filter(|(_, sample, _)| matches!(sample, Sample::Text(_)))
            .collect();
        assert_eq!(texts[0].1, &Sample::Text(vec!["caf\u{FFFD}".into()]));
        assert_eq!(String::from_utf8(log).unwrap(), "[1, 'caf\u{FFFD}']\n");
    }

    #[tokio::test]
    async fn read_error_ends_session() {
        let mut sink = MemorySink::new();
        let mut log = Vec::new();
        let mut s = Session::new(
            ResetConn,
            StreamRouter::new(&mut sink, StreamTemplate::default()),
            SessionLog::new(&mut log),
            &RelayConfig::default(),
        );
        let err = s.run().await.unwrap_err();
        assert!(matches!(err, RelayError::Read(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
        assert_eq!(s.metrics().chunks_read, 0);
    }
}
