//! Configuration loading from file system
//!
//! Handles loading and parsing `config.json` from the bridge directory.

use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

use super::types::BridgeConfig;

/// Load configuration from `path`
///
/// Returns BridgeConfig::default() if the file is missing or invalid.
/// Unknown keys are ignored; missing keys take their defaults.
#[instrument(name = "load_config", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> BridgeConfig {
    if !path.exists() {
        info!("Config file not found, using defaults");
        return BridgeConfig::default();
    }

    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return BridgeConfig::default();
        }
    };

    match serde_json::from_str::<BridgeConfig>(&contents) {
        Ok(config) => {
            info!(
                app = %config.host.app_name,
                prefer_queued = config.prefer_queued,
                "Successfully loaded config"
            );
            config
        }
        Err(e) => {
            let hint = if e.to_string().contains("invalid type") {
                "\n\nHint: timing values are plain millisecond numbers, e.g. \"awaitTimeoutMs\": 5000"
            } else {
                ""
            };
            warn!(
                error = %e,
                hint = %hint,
                "Failed to parse config JSON, using defaults"
            );
            BridgeConfig::default()
        }
    }
}
