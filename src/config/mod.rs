//! Configuration module - bridge settings
//!
//! This module provides functionality for:
//! - Loading configuration from `<support-root>/bridge/config.json`
//! - Default values for all settings
//! - Type definitions for config structures
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions (BridgeConfig, HostConfig, TimingConfig)
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{
    DEFAULT_AWAIT_TIMEOUT_MS, DEFAULT_JOB_TTL_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_TICK_INTERVAL_MS,
};

pub use types::{BridgeConfig, HostConfig, TimingConfig};

pub use loader::load_config;

#[cfg(test)]
pub use defaults::{
    DEFAULT_APP_NAME, DEFAULT_AUTOMATION_TIMEOUT_MS, DEFAULT_PROCESS_NAME, DEFAULT_SCRIPT_NAME,
    DEFAULT_SEED_VERSIONS, DEFAULT_SETTLE_DELAY_MS,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
