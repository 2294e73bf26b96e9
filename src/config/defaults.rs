//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Host application as addressed by the automation call
pub const DEFAULT_APP_NAME: &str = "Adobe After Effects 2025";

/// Process name used for the liveness check
pub const DEFAULT_PROCESS_NAME: &str = "After Effects";

/// File name of the consumer loop script deployed into Scripts/Startup
pub const DEFAULT_SCRIPT_NAME: &str = "relay_bridge.jsx";

/// Argument that makes the host run a script at startup
pub const DEFAULT_STARTUP_SCRIPT_FLAG: &str = "-r";

/// Where host version folders live. Glob patterns and `~` are allowed.
pub const DEFAULT_INSTALL_ROOTS: &[&str] = &[
    "~/Library/Preferences/Adobe/After Effects",
    "~/AppData/Roaming/Adobe/After Effects",
];

/// Version folders seeded when a root has none yet
pub const DEFAULT_SEED_VERSIONS: &[&str] = &["24.0", "25.0", "26.0"];

/// Consumer loop tick interval
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5000;

/// Age after which queue entries are swept unconditionally (5 minutes)
pub const DEFAULT_JOB_TTL_MS: u64 = 5 * 60 * 1000;

/// Result awaiter deadline and poll interval
pub const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 150;

/// Hard limit for one automation child process
pub const DEFAULT_AUTOMATION_TIMEOUT_MS: u64 = 30_000;

/// How long to wait after launching the host before re-checking liveness
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 8000;
