//! Host-side consumer loop.
//!
//! The sole consumer of the queue and jobs directories. Each tick handles at
//! most one entry, so a tick never takes longer than one job. Errors are
//! swallowed at the tick boundary: a failed entry stays on disk and is
//! retried until it either succeeds or ages out through the TTL sweep.
//!
//! # Example
//! ```rust,ignore
//! let consumer = ConsumerLoop::new(dirs, host, &config.timing, sink);
//! let handle = consumer.start();
//! handle.wake();
//! ```

mod dispatch;
mod host;
mod scan;

pub use host::{HostError, HostRuntime, ItemId};
pub use scan::{list_entries, oldest, EntryKind, QueueEntry};

use std::fs;
use std::mem::discriminant;
use std::path::PathBuf;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::logging::LogSink;
use crate::paths::BridgeDirs;
use crate::utils::{age_of, remove_if_present};

/// What a single tick did with the queue
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Stop flag present, nothing touched and nothing logged to the sink
    Stopped,
    /// The user has a selection in the active document, nothing touched
    Busy,
    /// Nothing to process after the sweep
    Idle,
    /// The queue could not be listed this tick
    Unreadable { reason: String },
    Processed { path: PathBuf, kind: EntryKind },
    /// Read or dispatch failed; the entry stays for a later tick
    Retained {
        path: PathBuf,
        kind: EntryKind,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub outcome: TickOutcome,
    /// Entries removed by the TTL sweep this tick
    pub swept: Vec<PathBuf>,
}

impl TickReport {
    fn quiet(outcome: TickOutcome) -> Self {
        TickReport {
            outcome,
            swept: Vec::new(),
        }
    }
}

pub struct ConsumerLoop<H: HostRuntime> {
    dirs: BridgeDirs,
    host: H,
    ttl: Duration,
    tick_interval: Duration,
    sink: Arc<dyn LogSink>,
    last_outcome: Option<TickOutcome>,
}

impl<H: HostRuntime> ConsumerLoop<H> {
    pub fn new(dirs: BridgeDirs, host: H, timing: &TimingConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            dirs,
            host,
            ttl: timing.job_ttl(),
            tick_interval: timing.tick_interval(),
            sink,
            last_outcome: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn dirs(&self) -> &BridgeDirs {
        &self.dirs
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(SystemTime::now())
    }

    /// One tick, judging entry ages against `now`
    pub fn tick_at(&mut self, now: SystemTime) -> TickReport {
        let report = self.run_tick(now);
        self.report(&report);
        report
    }

    fn run_tick(&mut self, now: SystemTime) -> TickReport {
        if self.dirs.is_stopped() {
            return TickReport::quiet(TickOutcome::Stopped);
        }

        if self.host.has_active_selection() {
            return TickReport::quiet(TickOutcome::Busy);
        }

        let entries = match list_entries(&self.dirs) {
            Ok(entries) => entries,
            Err(e) => {
                return TickReport::quiet(TickOutcome::Unreadable {
                    reason: e.to_string(),
                })
            }
        };
        if entries.is_empty() {
            return TickReport::quiet(TickOutcome::Idle);
        }

        let (stale, live): (Vec<QueueEntry>, Vec<QueueEntry>) = entries
            .into_iter()
            .partition(|entry| age_of(entry.modified, now) > self.ttl);
        let swept = self.sweep(&stale);

        let Some(entry) = oldest(&live) else {
            return TickReport {
                outcome: TickOutcome::Idle,
                swept,
            };
        };
        let entry = entry.clone();

        let outcome = self.process(&entry);
        TickReport { outcome, swept }
    }

    fn sweep(&self, stale: &[QueueEntry]) -> Vec<PathBuf> {
        let mut swept = Vec::new();
        for entry in stale {
            match remove_if_present(&entry.path) {
                Ok(true) => swept.push(entry.path.clone()),
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "TTL sweep could not remove entry")
                }
            }
        }
        swept
    }

    fn process(&mut self, entry: &QueueEntry) -> TickOutcome {
        let text = match fs::read_to_string(&entry.path) {
            Ok(text) => text,
            Err(e) => {
                return TickOutcome::Retained {
                    path: entry.path.clone(),
                    kind: entry.kind,
                    reason: format!("read failed: {}", e),
                }
            }
        };

        let jobs_dir = self.dirs.jobs_dir();
        if let Err(e) = dispatch::dispatch(&mut self.host, &jobs_dir, entry, &text) {
            return TickOutcome::Retained {
                path: entry.path.clone(),
                kind: entry.kind,
                reason: e.to_string(),
            };
        }

        if let Err(e) = remove_if_present(&entry.path) {
            // Ran but could not be removed; the next tick will run it again
            return TickOutcome::Retained {
                path: entry.path.clone(),
                kind: entry.kind,
                reason: format!("processed but not removed: {}", e),
            };
        }

        TickOutcome::Processed {
            path: entry.path.clone(),
            kind: entry.kind,
        }
    }

    fn report(&mut self, report: &TickReport) {
        let mut lines: Vec<String> = report
            .swept
            .iter()
            .map(|path| format!("swept stale entry {}", display_name(path)))
            .collect();

        let repeated = self
            .last_outcome
            .as_ref()
            .is_some_and(|last| discriminant(last) == discriminant(&report.outcome));

        match &report.outcome {
            // The sink may be a file under the bridge dir; a paused loop writes nothing
            TickOutcome::Stopped if !repeated => debug!("Stop flag present, consumer paused"),
            TickOutcome::Busy if !repeated => {
                lines.push("active selection, deferring queue".to_string())
            }
            TickOutcome::Idle if !repeated => lines.push("queue idle".to_string()),
            TickOutcome::Unreadable { reason } => {
                lines.push(format!("queue listing failed: {}", reason))
            }
            TickOutcome::Processed { path, kind } => {
                info!(path = %path.display(), kind = kind.label(), "Queue entry processed");
                lines.push(format!("processed {} {}", kind.label(), display_name(path)))
            }
            TickOutcome::Retained { path, kind, reason } => {
                warn!(path = %path.display(), kind = kind.label(), reason = %reason, "Queue entry retained");
                lines.push(format!(
                    "retained {} {}: {}",
                    kind.label(),
                    display_name(path),
                    reason
                ))
            }
            _ => {}
        }

        debug!(outcome = ?report.outcome, swept = report.swept.len(), "Consumer tick");
        if !lines.is_empty() {
            self.sink.log(&lines);
        }
        self.last_outcome = Some(report.outcome.clone());
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// =============================================================================
// TIMER THREAD
// =============================================================================

enum Signal {
    Wake,
    Stop,
}

/// Owner of a running consumer thread. Dropping it stops the thread.
pub struct ConsumerHandle<H: HostRuntime + Send + 'static> {
    tx: Sender<Signal>,
    thread: Option<JoinHandle<ConsumerLoop<H>>>,
}

impl<H: HostRuntime + Send + 'static> ConsumerLoop<H> {
    /// Run ticks on a dedicated thread every `tick_interval`, or sooner when
    /// woken through the returned handle
    pub fn start(self) -> ConsumerHandle<H> {
        let (tx, rx) = channel();
        let interval = self.tick_interval;

        let thread = thread::spawn(move || {
            let mut consumer = self;
            info!(interval_ms = interval.as_millis() as u64, "Consumer loop started");
            loop {
                consumer.tick();
                match rx.recv_timeout(interval) {
                    Ok(Signal::Wake) | Err(RecvTimeoutError::Timeout) => continue,
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("Consumer loop stopped");
            consumer
        });

        ConsumerHandle {
            tx,
            thread: Some(thread),
        }
    }
}

impl<H: HostRuntime + Send + 'static> ConsumerHandle<H> {
    /// Run the next tick now instead of waiting for the timer
    pub fn wake(&self) {
        if self.tx.send(Signal::Wake).is_err() {
            debug!("Consumer thread already gone, wake ignored");
        }
    }

    /// Stop the thread and hand the consumer back
    pub fn stop(mut self) -> Option<ConsumerLoop<H>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<ConsumerLoop<H>> {
        let _ = self.tx.send(Signal::Stop);
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(consumer) => Some(consumer),
            Err(_) => {
                warn!("Consumer thread panicked");
                None
            }
        }
    }
}

impl<H: HostRuntime + Send + 'static> Drop for ConsumerHandle<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
