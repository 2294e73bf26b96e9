//! Host liveness probing.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Lightweight process-presence query
pub trait ProcessProbe: Send + Sync {
    fn is_process_running(&self, name: &str) -> bool;
}

/// Process table lookup through `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl ProcessProbe for SysinfoProbe {
    fn is_process_running(&self, name: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .any(|process| process.name().to_string_lossy().eq_ignore_ascii_case(name))
    }
}

/// Answers "is the host up" for the configured process name.
///
/// Fail-closed: a probe that panics counts as "not running", so direct
/// invocation never proceeds on a guess.
#[derive(Clone)]
pub struct HostLiveness {
    probe: Arc<dyn ProcessProbe>,
    process_name: String,
}

impl HostLiveness {
    pub fn new(probe: Arc<dyn ProcessProbe>, process_name: impl Into<String>) -> Self {
        Self {
            probe,
            process_name: process_name.into(),
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn is_running(&self) -> bool {
        match catch_unwind(AssertUnwindSafe(|| {
            self.probe.is_process_running(&self.process_name)
        })) {
            Ok(running) => {
                debug!(process = %self.process_name, running, "Liveness probe");
                running
            }
            Err(_) => {
                warn!(process = %self.process_name, "Liveness probe failed, treating host as not running");
                false
            }
        }
    }
}
