//! Configuration type definitions
//!
//! This module contains all the struct definitions for configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults::*;
use crate::error::{BridgeError, Result};

// ============================================
// HOST CONFIG
// ============================================

/// Which host application to drive and where its scripts live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Application name used by the automation call (default: "Adobe After Effects 2025")
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Process name matched by the liveness probe (default: "After Effects")
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// Startup script file name (default: "relay_bridge.jsx")
    #[serde(default = "default_script_name")]
    pub script_name: String,
    /// Roots containing per-version folders; glob patterns allowed
    #[serde(default = "default_install_roots")]
    pub install_roots: Vec<String>,
    /// Version folders created when none exist yet
    #[serde(default = "default_seed_versions")]
    pub seed_versions: Vec<String>,
    /// Launch argument that runs a script at host startup (default: "-r")
    #[serde(default = "default_startup_script_flag")]
    pub startup_script_flag: String,
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}
fn default_process_name() -> String {
    DEFAULT_PROCESS_NAME.to_string()
}
fn default_script_name() -> String {
    DEFAULT_SCRIPT_NAME.to_string()
}
fn default_install_roots() -> Vec<String> {
    DEFAULT_INSTALL_ROOTS.iter().map(|s| s.to_string()).collect()
}
fn default_seed_versions() -> Vec<String> {
    DEFAULT_SEED_VERSIONS.iter().map(|s| s.to_string()).collect()
}
fn default_startup_script_flag() -> String {
    DEFAULT_STARTUP_SCRIPT_FLAG.to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            app_name: default_app_name(),
            process_name: default_process_name(),
            script_name: default_script_name(),
            install_roots: default_install_roots(),
            seed_versions: default_seed_versions(),
            startup_script_flag: default_startup_script_flag(),
        }
    }
}

// ============================================
// TIMING CONFIG
// ============================================

/// Intervals and deadlines, all in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Consumer loop tick interval (default: 5000)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Queue entries older than this are swept (default: 300000)
    #[serde(default = "default_job_ttl_ms")]
    pub job_ttl_ms: u64,
    /// Result awaiter deadline (default: 5000)
    #[serde(default = "default_await_timeout_ms")]
    pub await_timeout_ms: u64,
    /// Result awaiter poll interval (default: 150)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Automation child process limit (default: 30000)
    #[serde(default = "default_automation_timeout_ms")]
    pub automation_timeout_ms: u64,
    /// Wait after launching the host (default: 8000)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
fn default_job_ttl_ms() -> u64 {
    DEFAULT_JOB_TTL_MS
}
fn default_await_timeout_ms() -> u64 {
    DEFAULT_AWAIT_TIMEOUT_MS
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_automation_timeout_ms() -> u64 {
    DEFAULT_AUTOMATION_TIMEOUT_MS
}
fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            job_ttl_ms: DEFAULT_JOB_TTL_MS,
            await_timeout_ms: DEFAULT_AWAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            automation_timeout_ms: DEFAULT_AUTOMATION_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_millis(self.job_ttl_ms)
    }

    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the awaiter
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn automation_timeout(&self) -> Duration {
        Duration::from_millis(self.automation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

// ============================================
// MAIN CONFIG
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Route every command through the job queue, even ones that could go direct
    #[serde(default)]
    pub prefer_queued: bool,
}

impl BridgeConfig {
    /// Reject settings the bridge cannot work with
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("host.appName", &self.host.app_name),
            ("host.processName", &self.host.process_name),
            ("host.scriptName", &self.host.script_name),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::Config(format!("{} must not be empty", field)));
            }
        }
        if self.timing.tick_interval_ms == 0 {
            return Err(BridgeError::Config(
                "timing.tickIntervalMs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
