//! Automation and liveness capabilities
//!
//! The bridge never talks to the host directly. It consumes two
//! capabilities:
//! - [`Automation`] - run a script file inside the host, or launch the host
//! - [`ProcessProbe`] - is a process with a given name alive
//!
//! `osascript` and `sysinfo` back the production implementations; tests
//! substitute in-memory fakes.

mod osascript;
mod probe;

use std::path::Path;

use crate::error::Result;

pub use osascript::{run_with_timeout, OsascriptAutomation};
pub use probe::{HostLiveness, ProcessProbe, SysinfoProbe};

/// What the automation child process reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    /// Exit status (None when killed by a signal)
    pub status: Option<i32>,
    /// Trimmed stdout; for `DoScriptFile` this is the script's return value
    pub stdout: String,
    pub stderr: String,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// The host's automation entry point.
///
/// Both calls are synchronous and bounded by an OS-level timeout.
/// Implementations return `BridgeError::AutomationInvocation` only when the
/// child could not be spawned or had to be killed; a non-zero exit is
/// reported through [`InvocationOutput::status`].
pub trait Automation: Send + Sync {
    /// Activate the host and run `script` in its scripting runtime
    fn invoke(&self, script: &Path) -> Result<InvocationOutput>;

    /// Start the host application with extra launch arguments
    fn launch(&self, args: &[String]) -> Result<()>;
}
