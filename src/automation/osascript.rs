//! `osascript`-backed automation entry point (macOS).
//!
//! `invoke` runs `tell application "<app>" to DoScriptFile "<path>"`. The
//! AppleScript result (the value the host script returns) is printed on
//! stdout, which is how a script signals `RB_BUSY` back to the caller.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use super::{Automation, InvocationOutput};
use crate::error::{BridgeError, Result};

const WAIT_STEP: Duration = Duration::from_millis(50);

pub struct OsascriptAutomation {
    app_name: String,
    timeout: Duration,
}

impl OsascriptAutomation {
    pub fn new(app_name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            app_name: app_name.into(),
            timeout,
        }
    }

    fn do_script_file_source(&self, script: &Path) -> String {
        format!(
            "tell application \"{}\" to DoScriptFile \"{}\"",
            escape_applescript(&self.app_name),
            escape_applescript(&script.to_string_lossy())
        )
    }
}

/// Escape a value for use inside an AppleScript string literal
fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Automation for OsascriptAutomation {
    #[instrument(name = "automation_invoke", skip(self), fields(app = %self.app_name))]
    fn invoke(&self, script: &Path) -> Result<InvocationOutput> {
        let source = self.do_script_file_source(script);
        debug!(source = %source, "Executing AppleScript");

        let mut command = Command::new("osascript");
        command.arg("-e").arg(&source);
        let output = run_with_timeout(&mut command, self.timeout)?;

        if output.success() {
            debug!(result = %output.stdout, "AppleScript executed successfully");
        } else {
            error!(status = ?output.status, stderr = %output.stderr, "AppleScript execution failed");
        }
        Ok(output)
    }

    #[instrument(name = "automation_launch", skip(self), fields(app = %self.app_name))]
    fn launch(&self, args: &[String]) -> Result<()> {
        info!(?args, "Launching host application");

        let mut command = Command::new("open");
        command.arg("-a").arg(&self.app_name);
        if !args.is_empty() {
            command.arg("--args").args(args);
        }

        let output = run_with_timeout(&mut command, self.timeout)?;
        if output.success() {
            Ok(())
        } else {
            Err(BridgeError::AutomationInvocation {
                message: format!("could not launch {}: {}", self.app_name, output.stderr),
                status: output.status,
            })
        }
    }
}

/// Run a child process, killing it if it outlives `timeout`.
///
/// stdout and stderr are drained on reader threads so a chatty child cannot
/// block on a full pipe while we wait.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<InvocationOutput> {
    let program = format!("{:?}", command.get_program());
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BridgeError::AutomationInvocation {
            message: format!("failed to spawn {}: {}", program, e),
            status: None,
        })?;

    let stdout_reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    warn!(program = %program, timeout_ms = timeout.as_millis() as u64, "Child timed out, killing");
                    abandon(&mut child);
                    return Err(BridgeError::AutomationInvocation {
                        message: format!(
                            "{} timed out after {} ms",
                            program,
                            timeout.as_millis()
                        ),
                        status: None,
                    });
                }
                thread::sleep(WAIT_STEP);
            }
            Err(e) => {
                abandon(&mut child);
                return Err(BridgeError::AutomationInvocation {
                    message: format!("wait error for {}: {}", program, e),
                    status: None,
                });
            }
        }
    };

    let stdout = stdout_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    Ok(InvocationOutput {
        status: status.code(),
        stdout: stdout.trim().to_string(),
        stderr: stderr.trim().to_string(),
    })
}

/// Kill `child` and reap it so no zombie outlives the call
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
