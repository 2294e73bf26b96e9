//! Job descriptors and result artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::utils::now_millis;

/// Prefix shared by every descriptor and artifact file name
pub const JOB_FILE_PREFIX: &str = "rb_";
pub const DESCRIPTOR_SUFFIX: &str = ".json";
pub const ARTIFACT_SUFFIX: &str = ".done.json";

/// Unique job token: `<unix-millis>_<random hex>`.
///
/// The random suffix keeps concurrent producers that land on the same
/// millisecond from colliding on a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        JobId(format!("{}_{}", now_millis(), &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the id from a descriptor or artifact file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(JOB_FILE_PREFIX)?;
        let id = rest
            .strip_suffix(ARTIFACT_SUFFIX)
            .or_else(|| rest.strip_suffix(DESCRIPTOR_SUFFIX))?;
        if id.is_empty() {
            None
        } else {
            Some(JobId(id.to_string()))
        }
    }

    pub fn descriptor_file_name(&self) -> String {
        format!("{}{}{}", JOB_FILE_PREFIX, self.0, DESCRIPTOR_SUFFIX)
    }

    pub fn artifact_file_name(&self) -> String {
        format!("{}{}{}", JOB_FILE_PREFIX, self.0, ARTIFACT_SUFFIX)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        JobId(value.to_string())
    }
}

/// A pending command, persisted as `rb_<id>.json` in the jobs directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub command: Command,
    /// Where the consumer writes the result
    pub artifact_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, command: Command, jobs_dir: &Path) -> Self {
        let artifact_path = jobs_dir.join(id.artifact_file_name());
        Job {
            id,
            command,
            artifact_path,
            created_at: Utc::now(),
        }
    }

    /// Descriptor path, derived from the artifact location
    pub fn descriptor_path(&self) -> PathBuf {
        match self.artifact_path.parent() {
            Some(dir) => dir.join(self.id.descriptor_file_name()),
            None => PathBuf::from(self.id.descriptor_file_name()),
        }
    }
}

/// Result record for a queued job, `rb_<id>.done.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub request_id: JobId,
    pub operation: String,
    pub elapsed_ms: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Artifact {
    pub fn success(job: &Job, elapsed_ms: u64) -> Self {
        Artifact {
            request_id: job.id.clone(),
            operation: job.command.operation().to_string(),
            elapsed_ms,
            ok: true,
            error: None,
        }
    }

    pub fn failure(job: &Job, elapsed_ms: u64, error: impl Into<String>) -> Self {
        Artifact {
            request_id: job.id.clone(),
            operation: job.command.operation().to_string(),
            elapsed_ms,
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_job_ids_are_unique() {
        let ids: HashSet<JobId> = (0..2_000).map(|_| JobId::generate()).collect();
        assert_eq!(ids.len(), 2_000);
    }

    #[test]
    fn test_job_id_shape() {
        let id = JobId::generate();
        let (millis, suffix) = id.as_str().split_once('_').unwrap();
        assert!(millis.parse::<u64>().is_ok());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_file_names_round_trip() {
        let id = JobId::from("1700000000000_deadbeef");
        assert_eq!(id.descriptor_file_name(), "rb_1700000000000_deadbeef.json");
        assert_eq!(
            id.artifact_file_name(),
            "rb_1700000000000_deadbeef.done.json"
        );
        assert_eq!(
            JobId::from_file_name(&id.descriptor_file_name()),
            Some(id.clone())
        );
        assert_eq!(JobId::from_file_name(&id.artifact_file_name()), Some(id));
        assert_eq!(JobId::from_file_name("notes.json"), None);
        assert_eq!(JobId::from_file_name("rb_.json"), None);
    }

    #[test]
    fn test_descriptor_path_sits_next_to_artifact() {
        let job = Job::new(
            JobId::from("1_abcd1234"),
            Command::run_script_text("1"),
            Path::new("/support/bridge/jobs"),
        );
        assert_eq!(
            job.descriptor_path(),
            PathBuf::from("/support/bridge/jobs/rb_1_abcd1234.json")
        );
        assert_eq!(
            job.artifact_path,
            PathBuf::from("/support/bridge/jobs/rb_1_abcd1234.done.json")
        );
    }

    #[test]
    fn test_artifact_wire_format() {
        let job = Job::new(
            JobId::from("1_abcd1234"),
            Command::import_audio("/tmp/a.wav"),
            Path::new("/jobs"),
        );
        let json = serde_json::to_string(&Artifact::success(&job, 42)).unwrap();
        assert_eq!(
            json,
            r#"{"requestId":"1_abcd1234","operation":"importAudio","elapsedMs":42,"ok":true}"#
        );

        let failed = Artifact::failure(&job, 7, "no comp");
        let parsed: Artifact =
            serde_json::from_str(&serde_json::to_string(&failed).unwrap()).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("no comp"));
        assert!(!parsed.ok);
    }
}
