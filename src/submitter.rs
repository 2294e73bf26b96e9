//! Job submission.
//!
//! Producers never coordinate with each other: uniqueness comes from
//! [`JobId::generate`] and visibility from write-then-rename. The submitter
//! only ever creates files; deletion belongs to the consumer, the awaiter
//! and the TTL sweep.

use std::path::PathBuf;

use tracing::{info, instrument};

use crate::command::Command;
use crate::error::{BridgeError, Result};
use crate::job::{Job, JobId};
use crate::jsx;
use crate::paths::BridgeDirs;
use crate::utils::write_atomic;

/// Extension of audio-import drop files (content = absolute audio path)
pub const AUDIO_DROP_EXT: &str = "cmd";
/// Extension of script drop files (content = script text)
pub const SCRIPT_DROP_EXT: &str = "jsx";

#[derive(Debug, Clone)]
pub struct Submitter {
    dirs: BridgeDirs,
}

impl Submitter {
    pub fn new(dirs: BridgeDirs) -> Self {
        Self { dirs }
    }

    /// Write a job descriptor for `command` into the jobs directory.
    ///
    /// Write failures (permissions, full disk) are returned as
    /// [`BridgeError::Io`] without retrying.
    #[instrument(name = "submit_job", skip_all, fields(operation = command.operation()))]
    pub fn submit(&self, command: &Command) -> Result<Job> {
        command.validate()?;

        let jobs_dir = self.dirs.jobs_dir();
        let job = Job::new(JobId::generate(), command.clone(), &jobs_dir);
        let descriptor = serde_json::to_vec(&job)?;
        let path = job.descriptor_path();

        write_atomic(&path, &descriptor)
            .map_err(|e| BridgeError::io(format!("writing job descriptor {}", path.display()), e))?;

        info!(request_id = %job.id, path = %path.display(), "Job submitted");
        Ok(job)
    }

    /// Write a fire-and-forget drop file into the queue directory.
    ///
    /// Audio imports become `<id>.cmd` holding the absolute path; script
    /// commands become `<id>.jsx` holding the script text.
    #[instrument(name = "drop_file", skip_all, fields(operation = command.operation()))]
    pub fn drop_file(&self, command: &Command) -> Result<PathBuf> {
        command.validate()?;

        let id = JobId::generate();
        let (ext, body) = match command {
            Command::ImportAudio { path, .. } => {
                let absolute = if path.is_absolute() {
                    path.clone()
                } else {
                    std::env::current_dir()
                        .map_err(|e| BridgeError::io("resolving current directory", e))?
                        .join(path)
                };
                (AUDIO_DROP_EXT, absolute.to_string_lossy().to_string())
            }
            other => (
                SCRIPT_DROP_EXT,
                jsx::drop_script_body(other).unwrap_or_default(),
            ),
        };

        let path = self.dirs.queue_dir().join(format!("{}.{}", id, ext));
        write_atomic(&path, body.as_bytes())
            .map_err(|e| BridgeError::io(format!("writing drop file {}", path.display()), e))?;

        info!(path = %path.display(), "Drop file queued");
        Ok(path)
    }
}
