//! # eventrelay-stream
//!
//! Live event relay engine: one inbound TCP client, up to two outbound
//! labeled multi-channel streams.
//!
//! ## Architecture
//! ```text
//! TcpStream (single client)
//!       │  read, bounded by idle timeout ──(timeout)──► heartbeat
//!       ▼
//! Framer ("$$$"-split, `}`-terminated)
//!       │
//!       ▼
//! decode_record ──► SessionLog (one line per record)
//!       │
//!       ▼
//! StreamRouter (fingerprint per group → rebuild on change)
//!       │
//!       ▼
//! StreamSink::push  ← numeric stream, string stream
//! ```

pub mod config;
pub mod heartbeat;
pub mod listener;
pub mod router;
pub mod session;

pub use config::{OutletConfig, RelayConfig};
pub use heartbeat::{liveness_sample, DEFAULT_IDLE_TIMEOUT};
pub use router::{ActiveStream, RouteOutcome, RouterStats, StreamRouter, StreamTemplate};
pub use session::{Session, SessionEnd, SessionMetrics};
