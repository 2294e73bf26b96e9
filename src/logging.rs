//! Structured JSONL logging plus the bridge's line-oriented log sink.
//!
//! This module provides:
//! - **JSONL to file** (`<bridge>/logs/relay-bridge.jsonl`) via `tracing`
//! - **Pretty to stderr** - human-readable for operators
//! - [`LogSink`] - the `log(lines)` capability the bridge core writes to
//!
//! # Usage
//!
//! ```rust,ignore
//! use relay_bridge::logging;
//!
//! // Initialize logging - MUST keep guard alive for duration of program
//! let _guard = logging::init(&dirs.root().join("logs"));
//!
//! tracing::info!(request_id = %job.id, "Job submitted");
//! ```

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_NAME: &str = "relay-bridge.jsonl";

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
pub fn init(log_dir: &Path) -> LoggingGuard {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_dir.join(LOG_FILE_NAME);
    let writer: Box<dyn Write + Send> = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Box::new(file),
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            Box::new(std::io::sink())
        }
    };

    // Non-blocking writer so a slow disk never stalls a poll loop
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(writer);

    // Environment filter - default to info, allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .with_level(true)
        .compact();

    // try_init: a second call (tests, embedding hosts) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init();

    tracing::debug!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

// =============================================================================
// LOG SINK
// =============================================================================

/// Append-only line sink used by the bridge core.
///
/// Implementations must not fail the caller; a sink that cannot write drops
/// the lines.
pub trait LogSink: Send + Sync {
    fn log(&self, lines: &[String]);
}

/// Forwards lines to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, lines: &[String]) {
        for line in lines {
            tracing::info!(category = "BRIDGE", "{}", line);
        }
    }
}

/// Appends timestamped lines to a plain text file (`bridge.log`)
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, lines: &[String]) -> std::io::Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let stamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut buf = String::new();
        for line in lines {
            buf.push_str(&format!("[{}] {}\n", stamp, line));
        }
        file.write_all(buf.as_bytes())
    }
}

impl LogSink for FileLogSink {
    fn log(&self, lines: &[String]) {
        if lines.is_empty() {
            return;
        }
        if let Err(e) = self.append(lines) {
            tracing::warn!(error = %e, path = %self.path.display(), "Failed to append to bridge log");
        }
    }
}

/// Keeps the most recent lines in memory
#[derive(Debug)]
pub struct MemoryLogSink {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MemoryLogSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn recent(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new(200)
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, lines: &[String]) {
        let mut buf = self.lines.lock();
        for line in lines {
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(line.clone());
        }
    }
}

/// Fans lines out to several sinks
pub struct TeeLogSink {
    sinks: Vec<std::sync::Arc<dyn LogSink>>,
}

impl TeeLogSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for TeeLogSink {
    fn log(&self, lines: &[String]) {
        for sink in &self.sinks {
            sink.log(lines);
        }
    }
}
