//! Queue directory listing.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::job::{JobId, ARTIFACT_SUFFIX};
use crate::paths::{BridgeDirs, STOP_FLAG_NAME};
use crate::submitter::{AUDIO_DROP_EXT, SCRIPT_DROP_EXT};
use crate::utils::is_temp_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `<queue>/*.cmd`, content is an absolute audio path
    AudioImport,
    /// `<queue>/*.jsx`, content is script text
    Script,
    /// `<jobs>/rb_<id>.json`
    Job,
    /// `<jobs>/rb_<id>.done.json`; only ever swept, never dispatched
    Artifact,
    /// A `.tmp` file left behind by an interrupted writer; only ever swept
    Partial,
}

impl EntryKind {
    pub fn is_dispatchable(self) -> bool {
        !matches!(self, EntryKind::Artifact | EntryKind::Partial)
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::AudioImport => "audio-import",
            EntryKind::Script => "script",
            EntryKind::Job => "job",
            EntryKind::Artifact => "artifact",
            EntryKind::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub modified: SystemTime,
}

impl QueueEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn queue_kind(path: &Path) -> Option<EntryKind> {
    match path.extension()?.to_str()? {
        AUDIO_DROP_EXT => Some(EntryKind::AudioImport),
        SCRIPT_DROP_EXT => Some(EntryKind::Script),
        _ => None,
    }
}

fn jobs_kind(name: &str) -> Option<EntryKind> {
    JobId::from_file_name(name)?;
    if name.ends_with(ARTIFACT_SUFFIX) {
        Some(EntryKind::Artifact)
    } else {
        Some(EntryKind::Job)
    }
}

fn scan_dir(
    dir: &Path,
    classify: impl Fn(&Path, &str) -> Option<EntryKind>,
    out: &mut Vec<QueueEntry>,
) -> io::Result<()> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for dir_entry in read_dir {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let name = dir_entry.file_name().to_string_lossy().to_string();
        if name == STOP_FLAG_NAME {
            continue;
        }
        let kind = if is_temp_file(&path) {
            EntryKind::Partial
        } else {
            match classify(&path, &name) {
                Some(kind) => kind,
                None => continue,
            }
        };
        // Vanished between listing and stat: someone else already handled it
        let Ok(metadata) = dir_entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        out.push(QueueEntry {
            path,
            kind,
            modified,
        });
    }
    Ok(())
}

/// Every queue and job entry currently on disk, unordered
pub fn list_entries(dirs: &BridgeDirs) -> io::Result<Vec<QueueEntry>> {
    let mut entries = Vec::new();
    scan_dir(&dirs.queue_dir(), |path, _| queue_kind(path), &mut entries)?;
    scan_dir(&dirs.jobs_dir(), |_, name| jobs_kind(name), &mut entries)?;
    Ok(entries)
}

/// The entry to process this tick: oldest first, name as tie-break
pub fn oldest(entries: &[QueueEntry]) -> Option<&QueueEntry> {
    entries
        .iter()
        .filter(|e| e.kind.is_dispatchable())
        .min_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.path.cmp(&b.path))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_list_entries_partitions_by_kind() {
        let temp = TempDir::new().unwrap();
        let dirs = BridgeDirs::new(temp.path());
        dirs.ensure().unwrap();

        fs::write(dirs.queue_dir().join("1.cmd"), "/a.wav").unwrap();
        fs::write(dirs.queue_dir().join("2.jsx"), "1").unwrap();
        fs::write(dirs.queue_dir().join("3.jsx.tmp"), "partial").unwrap();
        fs::write(dirs.queue_dir().join("notes.txt"), "ignored").unwrap();
        fs::write(dirs.stop_flag(), "").unwrap();
        fs::write(dirs.jobs_dir().join("rb_1_a.json"), "{}").unwrap();
        fs::write(dirs.jobs_dir().join("rb_1_a.done.json"), "{}").unwrap();
        fs::write(dirs.jobs_dir().join("other.json"), "{}").unwrap();

        let mut kinds: Vec<(String, EntryKind)> = list_entries(&dirs)
            .unwrap()
            .into_iter()
            .map(|e| (e.file_name(), e.kind))
            .collect();
        kinds.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            kinds,
            vec![
                ("1.cmd".to_string(), EntryKind::AudioImport),
                ("2.jsx".to_string(), EntryKind::Script),
                ("3.jsx.tmp".to_string(), EntryKind::Partial),
                ("rb_1_a.done.json".to_string(), EntryKind::Artifact),
                ("rb_1_a.json".to_string(), EntryKind::Job),
            ]
        );
    }

    #[test]
    fn test_missing_directories_are_empty() {
        let temp = TempDir::new().unwrap();
        let dirs = BridgeDirs::new(temp.path().join("nowhere"));
        assert!(list_entries(&dirs).unwrap().is_empty());
    }

    #[test]
    fn test_oldest_skips_artifacts_and_breaks_ties_by_name() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let entry = |name: &str, kind, offset: u64| QueueEntry {
            path: PathBuf::from(name),
            kind,
            modified: base + Duration::from_secs(offset),
        };
        let entries = vec![
            entry("rb_0.done.json", EntryKind::Artifact, 0),
            entry("b.jsx", EntryKind::Script, 5),
            entry("a.cmd", EntryKind::AudioImport, 5),
            entry("rb_9.json", EntryKind::Job, 9),
        ];

        assert_eq!(oldest(&entries).unwrap().file_name(), "a.cmd");
        assert!(oldest(&entries[..1]).is_none());
    }
}
