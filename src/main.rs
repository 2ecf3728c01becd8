//! `mbes-ingest` command-line node.

use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use mbes_ingest::prelude::*;

type CliResult<T = ()> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(version, about = "Multibeam sonar ingestion node", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive from the sonar until Ctrl-C
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write published records to stdout as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Dispatch packets from raw capture logs
    Replay {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write published records to stdout as JSON lines
        #[arg(long)]
        json: bool,

        /// Capture logs, replayed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the default configuration
    Defaults,
}

/// One JSON output line.
#[derive(Serialize)]
struct Line<'a> {
    topic: &'a str,
    #[serde(flatten)]
    record: &'a Record,
}

fn init_logging(level: &str, json: bool) -> CliResult {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    // stdout is reserved for records
    if json {
        subscriber
            .with(fmt::layer().json().with_target(true).with_writer(io::stderr))
            .try_init()?;
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> CliResult<IngestConfig> {
    let config = match path {
        Some(path) => IngestConfig::load(path)?,
        None => IngestConfig::default(),
    };
    Ok(config)
}

fn write_line(out: &mut impl Write, topic: &Topic, record: &Record) -> io::Result<()> {
    serde_json::to_writer(&mut *out, &Line {
        topic: topic.name(),
        record,
    })?;
    out.write_all(b"\n")
}

async fn run(config: IngestConfig, json: bool) -> CliResult {
    let publisher = Arc::new(BroadcastPublisher::with_capacity(config.topic_capacity));

    let mut printers = Vec::new();
    if json {
        for topic in config.topics.to_topics().advertised() {
            let mut rx = publisher.subscribe(topic);
            let topic = topic.clone();
            printers.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(record) => {
                            let mut out = io::stdout().lock();
                            if let Err(e) = write_line(&mut out, &topic, &record) {
                                error!(error = %e, "cannot write to stdout");
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => warn!(%topic, skipped = n, "output lagging"),
                        Err(RecvError::Closed) => break,
                    }
                }
            }));
        }
    }

    let service = IngestService::bind(config, Arc::clone(&publisher)).await?;
    let running = service.start();

    tokio::signal::ctrl_c().await?;
    info!("interrupted, shutting down");

    let report = running.shutdown().await?;
    for printer in printers {
        printer.abort();
    }

    for receiver in &report.receivers {
        info!(
            kind = %receiver.kind,
            received = receiver.stats.received,
            dispatched = receiver.stats.dispatched,
            malformed = receiver.stats.malformed,
            mismatched = receiver.stats.mismatched,
            empty = receiver.stats.empty,
            captured = receiver.capture.frames_written,
            capture_dropped = receiver.capture.frames_dropped,
            "receiver summary"
        );
    }
    let d = report.dispatch;
    info!(
        detections = d.detections,
        images = d.images,
        evicted = d.cache.evicted,
        stale = d.cache.stale,
        duplicates = d.cache.duplicates,
        restarts = d.cache.restarts,
        delivered = publisher.delivered(),
        "dispatch summary"
    );
    Ok(())
}

/// Publisher writing records straight to stdout, for offline replay.
#[derive(Default)]
struct JsonLines {
    enabled: bool,
    written: AtomicU64,
}

impl Publish for JsonLines {
    fn publish(&self, topic: &Topic, record: Record) {
        if !self.enabled {
            return;
        }
        match write_line(&mut io::stdout().lock(), topic, &record) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => error!(error = %e, "cannot write to stdout"),
        }
    }
}

fn replay_files(config: IngestConfig, json: bool, files: &[PathBuf]) -> CliResult {
    let dispatcher = Dispatcher::new(
        JsonLines {
            enabled: json,
            ..JsonLines::default()
        },
        config.topics.to_topics(),
        config.frame_ids(),
        config.retention(),
    );

    let mut total = ReplayStats::default();
    for path in files {
        let stats = replay(CaptureReader::open(path)?, &dispatcher);
        info!(
            file = %path.display(),
            frames = stats.frames,
            dispatched = stats.dispatched,
            unknown = stats.unknown,
            malformed = stats.malformed,
            truncated = stats.truncated,
            "replayed"
        );
        total.merge(stats);
    }

    let d = dispatcher.stats();
    info!(
        frames = total.frames,
        detections = d.detections,
        images = d.images,
        pending = d.pending_images,
        evicted = d.cache.evicted,
        written = dispatcher.publisher().written.load(Ordering::Relaxed),
        "replay summary"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Command::Run { config, json } => run(load_config(config.as_deref())?, json).await,
        Command::Replay {
            config,
            json,
            files,
        } => replay_files(load_config(config.as_deref())?, json, &files),
        Command::Defaults => {
            print!("{}", IngestConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}
