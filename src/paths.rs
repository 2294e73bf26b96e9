//! Bridge directory layout.
//!
//! [`BridgeDirs`] is the explicit handle to the shared queue resource. It is
//! passed into the submitter, the trigger, the awaiter and the consumer loop
//! instead of living in a global.
//!
//! ```text
//! <support-root>/bridge/
//! ├── queue/              # drop files (*.cmd, *.jsx) and STOP_BRIDGE.txt
//! ├── jobs/               # rb_<id>.json descriptors, rb_<id>.done.json artifacts
//! ├── tmp/                # throwaway scripts for direct invocation
//! ├── config.json         # optional configuration
//! └── bridge.log          # append-only log sink
//! ```

use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// Environment variable to override the default support root
pub const SUPPORT_ROOT_ENV: &str = "RELAY_BRIDGE_PATH";

/// Name of the stop sentinel inside the queue directory
pub const STOP_FLAG_NAME: &str = "STOP_BRIDGE.txt";

/// Get the support root, respecting RELAY_BRIDGE_PATH
///
/// Priority:
/// 1. RELAY_BRIDGE_PATH environment variable (if set, `~` expanded)
/// 2. `<data dir>/relay-bridge` (`~/Library/Application Support` on macOS)
/// 3. Temp directory fallback
pub fn get_support_root() -> PathBuf {
    if let Ok(root) = std::env::var(SUPPORT_ROOT_ENV) {
        return PathBuf::from(shellexpand::tilde(&root).as_ref());
    }

    match dirs::data_dir() {
        Some(data) => data.join("relay-bridge"),
        None => std::env::temp_dir().join("relay-bridge"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDirs {
    root: PathBuf,
}

impl BridgeDirs {
    /// Layout rooted at `<support_root>/bridge`
    pub fn new(support_root: impl AsRef<Path>) -> Self {
        Self {
            root: support_root.as_ref().join("bridge"),
        }
    }

    pub fn from_env() -> Self {
        Self::new(get_support_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.root.join("queue")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn stop_flag(&self) -> PathBuf {
        self.queue_dir().join(STOP_FLAG_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join("bridge.log")
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag().exists()
    }

    /// Create the queue, jobs and tmp directories
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.queue_dir(), self.jobs_dir(), self.tmp_dir()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| BridgeError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }
}
