//! Result awaiter for queued jobs.
//!
//! A bounded poll: the loop never sleeps past its deadline and never runs
//! forever. On timeout the descriptor is removed so no later tick executes a
//! request nobody is waiting for.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::{DEFAULT_AWAIT_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS};
use crate::error::{BridgeError, Result, ResultExt};
use crate::job::{Artifact, Job};
use crate::utils::{remove_if_present, temp_path_for};

#[derive(Debug, Clone, Copy)]
pub struct ResultAwaiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl Default for ResultAwaiter {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_AWAIT_TIMEOUT_MS),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
    }
}

impl ResultAwaiter {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the artifact of `job`.
    ///
    /// Returns the artifact when the host reports success,
    /// [`BridgeError::JobFailed`] when it reports failure and
    /// [`BridgeError::Timeout`] when nothing readable shows up in time.
    pub fn await_result(&self, job: &Job) -> Result<Artifact> {
        self.await_result_until(job, None)
    }

    /// Like [`Self::await_result`], giving up at `caller_deadline` if that
    /// comes before the awaiter's own timeout.
    #[instrument(name = "await_result", skip_all, fields(request_id = %job.id))]
    pub fn await_result_until(
        &self,
        job: &Job,
        caller_deadline: Option<Instant>,
    ) -> Result<Artifact> {
        let start = Instant::now();
        let deadline = match caller_deadline {
            Some(limit) => limit.min(start + self.timeout),
            None => start + self.timeout,
        };
        let temp_artifact = temp_path_for(&job.artifact_path);
        let mut polls = 0u32;

        loop {
            polls += 1;
            if let Some(artifact) =
                read_artifact(job, &job.artifact_path).or_else(|| read_artifact(job, &temp_artifact))
            {
                self.cleanup(job);
                info!(
                    polls,
                    waited_ms = start.elapsed().as_millis() as u64,
                    elapsed_ms = artifact.elapsed_ms,
                    ok = artifact.ok,
                    "Job result received"
                );
                return if artifact.ok {
                    Ok(artifact)
                } else {
                    Err(BridgeError::JobFailed {
                        request_id: job.id.to_string(),
                        message: artifact
                            .error
                            .unwrap_or_else(|| "unknown error".to_string()),
                    })
                };
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }

        // Nobody will read a result for this job any more
        remove_if_present(&job.descriptor_path()).warn_on_err();
        let waited_ms = start.elapsed().as_millis() as u64;
        warn!(polls, waited_ms, "Timed out waiting for job result");
        Err(BridgeError::Timeout {
            request_id: job.id.to_string(),
            waited_ms,
        })
    }

    fn cleanup(&self, job: &Job) {
        for path in [
            job.descriptor_path(),
            job.artifact_path.clone(),
            temp_path_for(&job.artifact_path),
        ] {
            remove_if_present(&path).warn_on_err();
        }
    }
}

/// A complete artifact for this job, or None while it is missing or partial
fn read_artifact(job: &Job, path: &std::path::Path) -> Option<Artifact> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice::<Artifact>(&bytes) {
        Ok(artifact) if artifact.request_id == job.id => Some(artifact),
        Ok(artifact) => {
            warn!(found = %artifact.request_id, path = %path.display(), "Artifact belongs to another job");
            None
        }
        Err(e) => {
            debug!(error = %e, path = %path.display(), "Artifact not complete yet");
            None
        }
    }
}
