use thiserror::Error;
use tracing::{error, warn};

use crate::command::DecodeError;

/// Error severity for operator-facing output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // expected, nothing to do
    Warning,  // recoverable, retry later
    Error,    // operation failed
    Critical, // requires operator action
}

/// Producer-side errors for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("I/O failure while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Host application '{app}' is not running")]
    NotRunning { app: String },

    #[error("Host application '{app}' is already running")]
    AlreadyRunning { app: String },

    #[error("Host is busy: the active document has a selection")]
    HostBusy,

    #[error("Host has no active document to operate on")]
    NoActiveSession,

    #[error("Consumer loop is paused by the stop flag")]
    ConsumerPaused,

    #[error("Timed out after {waited_ms} ms waiting for result of job {request_id}")]
    Timeout { request_id: String, waited_ms: u64 },

    #[error("Automation call failed: {message}")]
    AutomationInvocation {
        message: String,
        status: Option<i32>,
    },

    #[error("Job {request_id} failed in host: {message}")]
    JobFailed { request_id: String, message: String },

    #[error("Failed to decode command: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to serialize bridge record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Wrap an I/O error with a short description of what was being attempted
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Critical,
            Self::NotRunning { .. } => ErrorSeverity::Warning,
            Self::AlreadyRunning { .. } => ErrorSeverity::Info,
            Self::HostBusy => ErrorSeverity::Warning,
            Self::NoActiveSession => ErrorSeverity::Warning,
            Self::ConsumerPaused => ErrorSeverity::Info,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::AutomationInvocation { .. } => ErrorSeverity::Error,
            Self::JobFailed { .. } => ErrorSeverity::Error,
            Self::Decode(_) => ErrorSeverity::Error,
            Self::Serialize(_) => ErrorSeverity::Error,
            Self::Config(_) => ErrorSeverity::Warning,
        }
    }

    /// Message shown to the operator. Each failure class reads differently.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { context, source } => {
                format!("Bridge directory unavailable ({}): {}", context, source)
            }
            Self::NotRunning { app } => format!(
                "Host not running: start {} and open a project, then try again",
                app
            ),
            Self::AlreadyRunning { app } => {
                format!("{} is already running; restart refused", app)
            }
            Self::HostBusy => {
                "Host busy: clear the active selection in the host and try again".to_string()
            }
            Self::NoActiveSession => {
                "Host has no active composition or timeline to import into".to_string()
            }
            Self::ConsumerPaused => {
                "Bridge paused: run `relay-bridge resume` to let queued jobs through".to_string()
            }
            Self::Timeout { waited_ms, .. } => format!(
                "Timed out waiting for result after {} ms (is the bridge installed?)",
                waited_ms
            ),
            Self::AutomationInvocation { message, .. } => {
                format!("Automation call rejected: {}", message)
            }
            Self::JobFailed { message, .. } => format!("Host reported an error: {}", message),
            Self::Decode(e) => format!("Invalid command payload: {}", e),
            Self::Serialize(e) => format!("Could not encode bridge record: {}", e),
            Self::Config(msg) => format!("Configuration issue: {}", msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the caller doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use relay_bridge::error::ResultExt;
///
/// // Best-effort cleanup of a throwaway script
/// remove_if_present(&script_path).warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}
