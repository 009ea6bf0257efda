//! eventrelay CLI: accepts one live-event client and republishes its records
//! as labeled multi-channel streams.
//!
//! # Usage
//! ```text
//! eventrelay                              # listen on 0.0.0.0:5555, JSON lines on stdout
//! eventrelay --port 6000 --log-file run1.log
//! eventrelay --config relay.yaml --json-logs
//! eventrelay --dry-run                    # route into memory, print a summary at exit
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use eventrelay_core::{session_log::SessionLog, sink::StreamSink};
use eventrelay_observability::{init_tracing, LogConfig};
use eventrelay_sink::{JsonLinesSink, MemorySink, SinkEvent};
use eventrelay_stream::{listener, RelayConfig, Session, SessionEnd, StreamRouter, StreamTemplate};
use serde::Deserialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::net::TcpStream;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "eventrelay",
    about = "Relay live JSON events onto labeled multi-channel streams",
    long_about = "
eventrelay: accepts a single TCP client sending `$$$`-separated live_event
JSON objects, splits each record's `data` into numeric and string channels,
and republishes them as two streams. Every record is also appended to a
plain-text session log.

ENVIRONMENT VARIABLES:
  EVENTRELAY_CONFIG      YAML config file
  EVENTRELAY_HOST        Listen address
  EVENTRELAY_PORT        Listen port
  EVENTRELAY_LOG_FILE    Session log path
  EVENTRELAY_LOG_LEVEL   Diagnostic log level
",
    version
)]
struct Cli {
    /// YAML config file (relay settings plus an optional `logging:` section)
    #[arg(short, long, env = "EVENTRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to listen on (default: all)
    #[arg(long, env = "EVENTRELAY_HOST")]
    host: Option<String>,

    /// Port to listen on (default: 5555)
    #[arg(short, long, env = "EVENTRELAY_PORT")]
    port: Option<u16>,

    /// Session log file
    #[arg(long, env = "EVENTRELAY_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Name the outbound streams are published under
    #[arg(long)]
    stream_name: Option<String>,

    /// Read timeout before a heartbeat is sent, in milliseconds
    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// Diagnostic log level
    #[arg(long, env = "EVENTRELAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit diagnostics as JSON
    #[arg(long)]
    json_logs: bool,

    /// Route into memory instead of stdout and print a summary at exit
    #[arg(long)]
    dry_run: bool,
}

/// The `logging:` section of a config file. The remaining keys are relay
/// settings and go through [`RelayConfig::from_yaml_str`].
#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    #[serde(default)]
    logging: LogConfig,
}

impl Cli {
    /// Flags override file values.
    fn apply(&self, relay: &mut RelayConfig, logging: &mut LogConfig) {
        if let Some(host) = &self.host {
            relay.host = host.clone();
        }
        if let Some(port) = self.port {
            relay.port = port;
        }
        if let Some(path) = &self.log_file {
            relay.log_file = path.clone();
        }
        if let Some(name) = &self.stream_name {
            relay.outlet.stream_name = name.clone();
        }
        if let Some(ms) = self.idle_timeout_ms {
            relay.idle_timeout_ms = ms;
        }
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if self.json_logs {
            logging.json = true;
        }
    }
}

fn parse_config(text: &str) -> Result<(RelayConfig, LogConfig)> {
    let relay = RelayConfig::from_yaml_str(text)?;
    let LoggingSection { logging } = serde_yaml::from_str(text)?;
    Ok((relay, logging))
}

fn load_config(path: Option<&Path>) -> Result<(RelayConfig, LogConfig)> {
    let Some(path) = path else {
        return Ok((RelayConfig::default(), LogConfig::default()));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&text).with_context(|| format!("parsing config {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Run one session to completion and release everything it holds.
async fn run_session<S: StreamSink>(
    conn: TcpStream,
    sink: S,
    log: SessionLog<BufWriter<File>>,
    config: &RelayConfig,
) -> Result<SessionEnd> {
    let router = StreamRouter::new(sink, StreamTemplate::from_config(&config.outlet));
    let mut session = Session::new(conn, router, log, config);
    let end = session.run_until(shutdown_signal()).await;
    session.close();
    Ok(end?)
}

fn print_summary(sink: &MemorySink) {
    println!("─── Dry run summary ─────────────────────────────────────────");
    for event in sink.events() {
        if let SinkEvent::Created { handle, info } = event {
            println!(
                "  stream {handle}: {} ({}) {:?}",
                info.source_id,
                info.value_type,
                info.labels()
            );
        }
    }
    println!(
        "  created={} destroyed={} samples={}",
        sink.created_count(),
        sink.destroyed_count(),
        sink.pushes().len()
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut relay, mut logging) = load_config(cli.config.as_deref())?;
    cli.apply(&mut relay, &mut logging);
    relay.validate()?;
    init_tracing(&logging);

    // reported once, by the returned error
    let tcp = listener::bind(&relay.bind_addr()).await?;
    let log = SessionLog::open(&relay.log_file)
        .with_context(|| format!("opening session log {}", relay.log_file.display()))?;

    let (conn, _peer) = tokio::select! {
        accepted = listener::accept_one(tcp) => accepted?,
        _ = shutdown_signal() => {
            info!("Interrupted before a client connected");
            return Ok(());
        }
    };

    let end = if cli.dry_run {
        let mut sink = MemorySink::new();
        let end = run_session(conn, &mut sink, log, &relay).await;
        print_summary(&sink);
        end?
    } else {
        run_session(conn, JsonLinesSink::stdout(), log, &relay).await?
    };

    match end {
        SessionEnd::Interrupted => info!("Relay stopped by interrupt"),
        SessionEnd::PeerClosed => info!("Relay stopped: client disconnected"),
    }
    Ok(())
}
