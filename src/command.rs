//! Command model
//!
//! Commands travel as single-line JSON tagged by `type`:
//!
//! ```json
//! {"type":"importAudio","path":"/tmp/a.wav","requiresActiveSession":true}
//! {"type":"runScriptText","code":"alert(\"hi\")"}
//! {"type":"runScriptFile","path":"/Users/me/fix-markers.jsx"}
//! ```
//!
//! JSON string escaping keeps newlines, tabs and other control characters in
//! script text from corrupting the descriptor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_requires_active_session() -> bool {
    true
}

/// A one-shot instruction for the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Import an audio file and append it to the active timeline
    ImportAudio {
        path: PathBuf,
        /// The host must have an open document for the import to land
        #[serde(
            default = "default_requires_active_session",
            rename = "requiresActiveSession"
        )]
        requires_active_session: bool,
    },
    /// Evaluate raw host-scripting source
    RunScriptText { code: String },
    /// Evaluate an existing script file
    RunScriptFile { path: PathBuf },
}

/// How a command prefers to reach the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Execute immediately in the live session through the automation call
    Direct,
    /// Write a job descriptor and let the consumer loop pick it up
    Queued,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

impl Command {
    pub fn import_audio(path: impl Into<PathBuf>) -> Self {
        Command::ImportAudio {
            path: path.into(),
            requires_active_session: true,
        }
    }

    pub fn run_script_text(code: impl Into<String>) -> Self {
        Command::RunScriptText { code: code.into() }
    }

    pub fn run_script_file(path: impl Into<PathBuf>) -> Self {
        Command::RunScriptFile { path: path.into() }
    }

    /// Operation name recorded in artifacts and logs
    pub fn operation(&self) -> &'static str {
        match self {
            Command::ImportAudio { .. } => "importAudio",
            Command::RunScriptText { .. } => "runScriptText",
            Command::RunScriptFile { .. } => "runScriptFile",
        }
    }

    /// Capability flag used by [`crate::trigger::Bridge`] to pick a strategy.
    ///
    /// Only commands the direct strategy knows how to synthesize a script for
    /// go direct.
    pub fn delivery_mode(&self) -> DeliveryMode {
        match self {
            Command::ImportAudio { .. } | Command::RunScriptText { .. } => DeliveryMode::Direct,
            Command::RunScriptFile { .. } => DeliveryMode::Queued,
        }
    }

    /// Serialize to a single-line payload
    pub fn encode(&self) -> String {
        // Enum of paths and strings: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(payload: &str) -> Result<Command, DecodeError> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Err(DecodeError::Empty);
        }
        let command: Command = serde_json::from_str(trimmed)?;
        command.validate()?;
        Ok(command)
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        match self {
            Command::ImportAudio { path, .. } | Command::RunScriptFile { path } => {
                if path.as_os_str().is_empty() {
                    return Err(DecodeError::InvalidField {
                        field: "path",
                        reason: "must not be empty",
                    });
                }
            }
            Command::RunScriptText { code } => {
                if code.trim().is_empty() {
                    return Err(DecodeError::InvalidField {
                        field: "code",
                        reason: "must not be blank",
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Command> {
        vec![
            Command::import_audio("/tmp/a.wav"),
            Command::ImportAudio {
                path: PathBuf::from("/Volumes/SFX Library/Whoosh \"big\" 01.wav"),
                requires_active_session: false,
            },
            Command::run_script_text("alert(\"hi\");\n\tvar x = '\\n';\r\n\u{0}\u{1b}[0m"),
            Command::run_script_text("// ünïcødé ✓\u{2028}end"),
            Command::run_script_file("/Users/me/scripts/fix markers.jsx"),
        ]
    }

    #[test]
    fn test_round_trip_every_variant() {
        for command in samples() {
            let payload = command.encode();
            let decoded = Command::decode(&payload).unwrap();
            assert_eq!(decoded, command, "payload: {}", payload);
        }
    }

    #[test]
    fn test_payload_is_single_line() {
        for command in samples() {
            let payload = command.encode();
            assert!(!payload.contains('\n'), "payload: {}", payload);
            assert!(!payload.contains('\r'), "payload: {}", payload);
            assert!(!payload.contains('\u{0}'), "payload: {}", payload);
        }
    }

    #[test]
    fn test_wire_format() {
        let payload = Command::import_audio("/tmp/a.wav").encode();
        assert_eq!(
            payload,
            r#"{"type":"importAudio","path":"/tmp/a.wav","requiresActiveSession":true}"#
        );
    }

    #[test]
    fn test_requires_active_session_defaults_to_true() {
        let decoded = Command::decode(r#"{"type":"importAudio","path":"/tmp/b.wav"}"#).unwrap();
        assert_eq!(decoded, Command::import_audio("/tmp/b.wav"));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(Command::decode("   "), Err(DecodeError::Empty)));
        assert!(matches!(
            Command::decode(r#"{"type":"launchRockets"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            Command::decode("not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            Command::decode(r#"{"type":"runScriptText","code":"  "}"#),
            Err(DecodeError::InvalidField { field: "code", .. })
        ));
        assert!(matches!(
            Command::decode(r#"{"type":"runScriptFile","path":""}"#),
            Err(DecodeError::InvalidField { field: "path", .. })
        ));
    }

    #[test]
    fn test_delivery_mode_and_operation() {
        assert_eq!(
            Command::import_audio("/a.wav").delivery_mode(),
            DeliveryMode::Direct
        );
        assert_eq!(
            Command::run_script_text("1").delivery_mode(),
            DeliveryMode::Direct
        );
        assert_eq!(
            Command::run_script_file("/a.jsx").delivery_mode(),
            DeliveryMode::Queued
        );
        assert_eq!(Command::run_script_file("/a.jsx").operation(), "runScriptFile");
    }
}
