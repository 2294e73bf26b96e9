//! Delivery trigger.
//!
//! Two ways into the host, behind one [`Delivery`] trait:
//! - [`DirectInvocation`] runs a throwaway script synchronously in the live
//!   session. Fast, but every call is one automation round trip.
//! - [`QueuedInvocation`] writes a job descriptor and only wakes the
//!   installed consumer loop; the work happens on the host's own timer.
//!
//! Neither strategy ever launches the host. Starting it is an explicit,
//! separate step ([`Bridge::ensure_running`], [`Bridge::restart_with_script`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::automation::{
    Automation, HostLiveness, InvocationOutput, OsascriptAutomation, ProcessProbe, SysinfoProbe,
};
use crate::awaiter::ResultAwaiter;
use crate::command::{Command, DeliveryMode};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result, ResultExt};
use crate::job::{Artifact, Job, JobId};
use crate::jsx;
use crate::logging::{LogSink, TracingLogSink};
use crate::paths::BridgeDirs;
use crate::submitter::Submitter;
use crate::utils::{remove_if_present, write_atomic};

/// What a successful delivery produced
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryReceipt {
    /// Direct invocation returned without error
    Executed,
    /// Queued job finished and its artifact was collected
    Completed(Artifact),
    /// Queued job written and consumer woken; nobody is waiting for it
    Queued(Job),
}

pub trait Delivery: Send + Sync {
    fn mode(&self) -> DeliveryMode;
    fn deliver(&self, command: &Command) -> Result<DeliveryReceipt>;
}

fn ensure_live(liveness: &HostLiveness, app_name: &str) -> Result<()> {
    if liveness.is_running() {
        Ok(())
    } else {
        Err(BridgeError::NotRunning {
            app: app_name.to_string(),
        })
    }
}

/// Write `source` to a temp script, run it, and delete it whatever happens
fn invoke_throwaway(
    dirs: &BridgeDirs,
    automation: &dyn Automation,
    label: &str,
    source: &str,
) -> Result<InvocationOutput> {
    let path: PathBuf = dirs
        .tmp_dir()
        .join(format!("rb_{}_{}.jsx", label, JobId::generate()));
    write_atomic(&path, source.as_bytes())
        .map_err(|e| BridgeError::io(format!("writing script {}", path.display()), e))?;

    let result = automation.invoke(&path);
    remove_if_present(&path).warn_on_err();
    result
}

fn rejected(output: &InvocationOutput) -> BridgeError {
    let detail = if output.stderr.is_empty() {
        "no error output".to_string()
    } else {
        output.stderr.clone()
    };
    BridgeError::AutomationInvocation {
        message: format!("host rejected the script: {}", detail),
        status: output.status,
    }
}

// =============================================================================
// DIRECT
// =============================================================================

pub struct DirectInvocation {
    dirs: BridgeDirs,
    app_name: String,
    liveness: HostLiveness,
    automation: Arc<dyn Automation>,
}

impl DirectInvocation {
    pub fn new(
        dirs: BridgeDirs,
        app_name: impl Into<String>,
        liveness: HostLiveness,
        automation: Arc<dyn Automation>,
    ) -> Self {
        Self {
            dirs,
            app_name: app_name.into(),
            liveness,
            automation,
        }
    }
}

impl Delivery for DirectInvocation {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Direct
    }

    #[instrument(name = "deliver_direct", skip_all, fields(operation = command.operation()))]
    fn deliver(&self, command: &Command) -> Result<DeliveryReceipt> {
        ensure_live(&self.liveness, &self.app_name)?;
        command.validate()?;

        let source = jsx::direct_script(command);
        let output = invoke_throwaway(&self.dirs, self.automation.as_ref(), "direct", &source)?;
        if !output.success() {
            return Err(rejected(&output));
        }

        match output.stdout.as_str() {
            jsx::RESULT_BUSY => Err(BridgeError::HostBusy),
            jsx::RESULT_NO_SESSION => Err(BridgeError::NoActiveSession),
            _ => {
                info!("Direct invocation completed");
                Ok(DeliveryReceipt::Executed)
            }
        }
    }
}

// =============================================================================
// QUEUED
// =============================================================================

pub struct QueuedInvocation {
    dirs: BridgeDirs,
    app_name: String,
    liveness: HostLiveness,
    automation: Arc<dyn Automation>,
    submitter: Submitter,
    /// None: return as soon as the consumer has been woken
    awaiter: Option<ResultAwaiter>,
}

impl QueuedInvocation {
    pub fn new(
        dirs: BridgeDirs,
        app_name: impl Into<String>,
        liveness: HostLiveness,
        automation: Arc<dyn Automation>,
        awaiter: Option<ResultAwaiter>,
    ) -> Self {
        Self {
            submitter: Submitter::new(dirs.clone()),
            dirs,
            app_name: app_name.into(),
            liveness,
            automation,
            awaiter,
        }
    }

    fn wake(&self, job: &Job) -> Result<()> {
        let outcome = invoke_throwaway(
            &self.dirs,
            self.automation.as_ref(),
            "wake",
            &jsx::wake_script(&self.dirs),
        )
        .and_then(|output| {
            if !output.success() {
                return Err(rejected(&output));
            }
            match output.stdout.as_str() {
                jsx::RESULT_BUSY => Err(BridgeError::HostBusy),
                jsx::RESULT_PAUSED => Err(BridgeError::ConsumerPaused),
                _ => Ok(()),
            }
        });

        if outcome.is_err() {
            // The caller is told it failed; the consumer must not run it later
            remove_if_present(&job.descriptor_path()).warn_on_err();
        }
        outcome
    }
}

impl Delivery for QueuedInvocation {
    fn mode(&self) -> DeliveryMode {
        DeliveryMode::Queued
    }

    #[instrument(name = "deliver_queued", skip_all, fields(operation = command.operation()))]
    fn deliver(&self, command: &Command) -> Result<DeliveryReceipt> {
        ensure_live(&self.liveness, &self.app_name)?;

        let job = self.submitter.submit(command)?;
        self.wake(&job)?;

        match &self.awaiter {
            Some(awaiter) => awaiter.await_result(&job).map(DeliveryReceipt::Completed),
            None => {
                info!(request_id = %job.id, "Job queued without waiting");
                Ok(DeliveryReceipt::Queued(job))
            }
        }
    }
}

// =============================================================================
// BRIDGE
// =============================================================================

/// Producer-side entry point: picks a strategy per command and owns the
/// explicit host start-up helpers.
pub struct Bridge {
    config: BridgeConfig,
    liveness: HostLiveness,
    automation: Arc<dyn Automation>,
    direct: DirectInvocation,
    queued: QueuedInvocation,
    sink: Arc<dyn LogSink>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        dirs: BridgeDirs,
        automation: Arc<dyn Automation>,
        probe: Arc<dyn ProcessProbe>,
    ) -> Self {
        let liveness = HostLiveness::new(probe, config.host.process_name.clone());
        let awaiter = ResultAwaiter::new(config.timing.await_timeout(), config.timing.poll_interval());
        let app_name = config.host.app_name.clone();

        Self {
            direct: DirectInvocation::new(
                dirs.clone(),
                app_name.clone(),
                liveness.clone(),
                Arc::clone(&automation),
            ),
            queued: QueuedInvocation::new(
                dirs,
                app_name,
                liveness.clone(),
                Arc::clone(&automation),
                Some(awaiter),
            ),
            config,
            liveness,
            automation,
            sink: Arc::new(TracingLogSink),
        }
    }

    /// Production wiring: `osascript` automation and a `sysinfo` probe
    pub fn from_config(config: BridgeConfig, dirs: BridgeDirs) -> Self {
        let automation = Arc::new(OsascriptAutomation::new(
            config.host.app_name.clone(),
            config.timing.automation_timeout(),
        ));
        Self::new(config, dirs, automation, Arc::new(SysinfoProbe))
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Queued deliveries return [`DeliveryReceipt::Queued`] instead of
    /// waiting for the artifact
    pub fn without_await(mut self) -> Self {
        self.queued.awaiter = None;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.liveness.is_running()
    }

    pub fn mode_for(&self, command: &Command) -> DeliveryMode {
        if self.config.prefer_queued {
            DeliveryMode::Queued
        } else {
            command.delivery_mode()
        }
    }

    fn strategy(&self, mode: DeliveryMode) -> &dyn Delivery {
        match mode {
            DeliveryMode::Direct => &self.direct,
            DeliveryMode::Queued => &self.queued,
        }
    }

    /// Launch the host if it is not running, then wait the settle delay.
    ///
    /// Opt-in only; nothing in the delivery path calls this.
    #[instrument(skip(self))]
    pub fn ensure_running(&self) -> Result<()> {
        if self.liveness.is_running() {
            return Ok(());
        }

        info!(app = %self.config.host.app_name, "Host not running, launching");
        self.sink
            .log(&[format!("launching {}", self.config.host.app_name)]);
        self.automation.launch(&[])?;
        thread::sleep(self.config.timing.settle_delay());

        ensure_live(&self.liveness, &self.config.host.app_name)
    }

    /// Start the host with a one-shot startup script.
    ///
    /// Refuses while the host is running so it can never fight a live session.
    #[instrument(skip_all, fields(script = %script.display()))]
    pub fn restart_with_script(&self, script: &Path) -> Result<()> {
        if self.liveness.is_running() {
            return Err(BridgeError::AlreadyRunning {
                app: self.config.host.app_name.clone(),
            });
        }
        let script = std::fs::canonicalize(script)
            .map_err(|e| BridgeError::io(format!("resolving {}", script.display()), e))?;

        let args = vec![
            self.config.host.startup_script_flag.clone(),
            script.to_string_lossy().to_string(),
        ];
        self.sink.log(&[format!(
            "starting {} with {}",
            self.config.host.app_name,
            script.display()
        )]);
        self.automation.launch(&args)
    }

    /// Time the caller should allow for [`Self::ensure_running`]
    pub fn settle_delay(&self) -> Duration {
        self.config.timing.settle_delay()
    }

    /// Deliver `command` through the strategy [`Self::mode_for`] picks
    pub fn deliver(&self, command: &Command) -> Result<DeliveryReceipt> {
        let mode = self.mode_for(command);
        info!(operation = command.operation(), ?mode, "Delivering command");

        let result = self.strategy(mode).deliver(command);
        let line = match &result {
            Ok(DeliveryReceipt::Executed) => format!("{} delivered directly", command.operation()),
            Ok(DeliveryReceipt::Completed(artifact)) => format!(
                "{} completed as {} in {} ms",
                command.operation(),
                artifact.request_id,
                artifact.elapsed_ms
            ),
            Ok(DeliveryReceipt::Queued(job)) => {
                format!("{} queued as {}", command.operation(), job.id)
            }
            Err(e) => {
                warn!(error = %e, "Delivery failed");
                format!("{} failed: {}", command.operation(), e.user_message())
            }
        };
        self.sink.log(&[line]);
        result
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
