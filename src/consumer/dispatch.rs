//! Executing one queue entry inside the host.
//!
//! Every mutation runs inside an undo group so the user can revert it in one
//! step. Imports look before they create, so re-running an entry after a
//! partial failure does not duplicate the folder or the footage item.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::host::{HostError, HostRuntime};
use super::scan::{EntryKind, QueueEntry};
use crate::command::Command;
use crate::job::{Artifact, Job};
use crate::jsx::AUDIO_FOLDER_NAME;
use crate::utils::write_atomic;

pub(crate) const IMPORT_UNDO_GROUP: &str = "Relay Bridge: Import Audio";
pub(crate) const SCRIPT_UNDO_GROUP: &str = "Relay Bridge: Run Script";

/// Run `f` between begin/end undo group calls, closing the group on error too
fn with_undo_group<T>(
    host: &mut dyn HostRuntime,
    name: &str,
    f: impl FnOnce(&mut dyn HostRuntime) -> Result<T, HostError>,
) -> Result<T, HostError> {
    host.begin_undo_group(name);
    let result = f(&mut *host);
    host.end_undo_group();
    result
}

pub(crate) fn import_audio(
    host: &mut dyn HostRuntime,
    path: &Path,
    requires_active_session: bool,
) -> Result<(), HostError> {
    if requires_active_session && !host.has_active_timeline() {
        return Err(HostError::NoActiveSession);
    }

    with_undo_group(host, IMPORT_UNDO_GROUP, |host| {
        let bin = match host.find_bin(AUDIO_FOLDER_NAME) {
            Some(bin) => bin,
            None => host.create_bin(AUDIO_FOLDER_NAME)?,
        };
        let media = match host.find_media(path) {
            Some(media) => media,
            None => host.import_media(path, bin)?,
        };
        if host.has_active_timeline() {
            host.append_to_timeline(media)?;
        }
        Ok(())
    })
}

pub(crate) fn run_script(host: &mut dyn HostRuntime, code: &str) -> Result<(), HostError> {
    with_undo_group(host, SCRIPT_UNDO_GROUP, |host| host.eval_script(code))
}

pub(crate) fn run_command(host: &mut dyn HostRuntime, command: &Command) -> Result<(), HostError> {
    match command {
        Command::ImportAudio {
            path,
            requires_active_session,
        } => import_audio(host, path, *requires_active_session),
        Command::RunScriptText { code } => run_script(host, code),
        Command::RunScriptFile { path } => {
            let code = fs::read_to_string(path)?;
            run_script(host, &code)
        }
    }
}

/// Execute `entry` whose content is `text`.
///
/// For job descriptors the artifact is written next to the descriptor
/// whether the command succeeded or not; the returned error still reports
/// the failure so the caller keeps the descriptor for retry.
pub(crate) fn dispatch(
    host: &mut dyn HostRuntime,
    jobs_dir: &Path,
    entry: &QueueEntry,
    text: &str,
) -> Result<(), HostError> {
    match entry.kind {
        EntryKind::AudioImport => {
            let path = text.trim();
            if path.is_empty() {
                return Err(HostError::InvalidEntry("empty audio path".to_string()));
            }
            // Drop files attach to a timeline only when one is open
            import_audio(host, Path::new(path), false)
        }
        EntryKind::Script => run_script(host, text),
        EntryKind::Job => dispatch_job(host, jobs_dir, text),
        EntryKind::Artifact | EntryKind::Partial => Ok(()),
    }
}

fn dispatch_job(host: &mut dyn HostRuntime, jobs_dir: &Path, text: &str) -> Result<(), HostError> {
    let job: Job = serde_json::from_str(text)
        .map_err(|e| HostError::InvalidEntry(format!("malformed job descriptor: {}", e)))?;
    job.command
        .validate()
        .map_err(|e| HostError::InvalidEntry(e.to_string()))?;

    let started = Instant::now();
    let outcome = run_command(host, &job.command);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let artifact = match &outcome {
        Ok(()) => Artifact::success(&job, elapsed_ms),
        Err(e) => Artifact::failure(&job, elapsed_ms, e.to_string()),
    };
    // The artifact location is derived locally, never taken from the descriptor
    let artifact_path: PathBuf = jobs_dir.join(job.id.artifact_file_name());
    let bytes = serde_json::to_vec(&artifact)
        .map_err(|e| HostError::InvalidEntry(format!("artifact encoding failed: {}", e)))?;
    write_atomic(&artifact_path, &bytes)?;

    outcome
}
