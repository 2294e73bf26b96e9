//! Startup-script deployment.
//!
//! Finds the host's per-version preference folders and writes the consumer
//! loop into `<root>/<version>/Scripts/Startup/`, where the host runs it on
//! launch. Idempotent: installing twice leaves exactly one copy per version.
//! Never fails as a whole; per-target problems are collected as warnings.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use glob::glob;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::config::{HostConfig, TimingConfig};
use crate::jsx::render_startup_script;
use crate::paths::BridgeDirs;
use crate::utils::{remove_if_present, write_atomic};

/// Version folder names: `24.0`, `25`, `26.0.1`
fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(\.\d+)*$").expect("Invalid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Number of startup folders that now hold the current script
    pub installed_count: usize,
    pub message: String,
    pub targets: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

pub struct Installer {
    dirs: BridgeDirs,
    host: HostConfig,
    timing: TimingConfig,
}

impl Installer {
    pub fn new(dirs: BridgeDirs, host: HostConfig, timing: TimingConfig) -> Self {
        Self { dirs, host, timing }
    }

    /// Existing preference roots, from the configured (tilde/glob) patterns
    pub fn discover_roots(&self, warnings: &mut Vec<String>) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for pattern in &self.host.install_roots {
            let expanded = shellexpand::tilde(pattern).to_string();
            debug!(pattern = %expanded, "Globbing for host roots");
            match glob(&expanded) {
                Ok(paths) => {
                    for entry in paths {
                        match entry {
                            Ok(path) if path.is_dir() => {
                                if !roots.contains(&path) {
                                    roots.push(path);
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warnings.push(format!("Failed to read glob entry: {}", e)),
                        }
                    }
                }
                Err(e) => warnings.push(format!("Invalid install root '{}': {}", pattern, e)),
            }
        }
        roots
    }

    fn version_dirs(root: &Path) -> Vec<PathBuf> {
        let Ok(read_dir) = fs::read_dir(root) else {
            return Vec::new();
        };
        let mut versions: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| version_pattern().is_match(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect();
        versions.sort();
        versions
    }

    /// Version folders under every root; seeds the conventional ones under
    /// the first root when there are none at all
    fn discover_versions(&self, roots: &[PathBuf], warnings: &mut Vec<String>) -> Vec<PathBuf> {
        let versions: Vec<PathBuf> = roots.iter().flat_map(|r| Self::version_dirs(r)).collect();
        if !versions.is_empty() {
            return versions;
        }
        let Some(first) = roots.first() else {
            return versions;
        };

        let mut seeded = Vec::new();
        for version in &self.host.seed_versions {
            let dir = first.join(version);
            match fs::create_dir_all(&dir) {
                Ok(()) => {
                    debug!(path = %dir.display(), "Seeded version folder");
                    seeded.push(dir);
                }
                Err(e) => warnings.push(format!(
                    "Failed to seed version folder {}: {}",
                    dir.display(),
                    e
                )),
            }
        }
        seeded
    }

    fn startup_script_path(&self, version_dir: &Path) -> PathBuf {
        version_dir
            .join("Scripts")
            .join("Startup")
            .join(&self.host.script_name)
    }

    #[instrument(skip(self))]
    pub fn install(&self) -> InstallReport {
        let mut warnings = Vec::new();
        let roots = self.discover_roots(&mut warnings);
        let versions = self.discover_versions(&roots, &mut warnings);
        let script = render_startup_script(&self.dirs, &self.timing);

        let mut targets = Vec::new();
        for version_dir in &versions {
            let path = self.startup_script_path(version_dir);
            if write_if_changed(&path, &script, &mut warnings) {
                targets.push(path);
            }
        }

        if !targets.is_empty() {
            // The loop reads from these; create them now so the first tick is clean
            if let Err(e) = self.dirs.ensure() {
                warnings.push(e.to_string());
            }
        }

        let message = if targets.is_empty() && roots.is_empty() {
            format!("No {} preference folders found", self.host.process_name)
        } else if targets.is_empty() {
            "Could not write the startup script to any version folder".to_string()
        } else {
            format!(
                "Installed {} into {} version folder(s); restart {} to load it",
                self.host.script_name,
                targets.len(),
                self.host.process_name
            )
        };

        for warning in &warnings {
            warn!(warning = %warning, "Install warning");
        }
        info!(installed = targets.len(), "Startup script install finished");

        InstallReport {
            installed_count: targets.len(),
            message,
            targets,
            warnings,
        }
    }

    /// Remove every deployed copy; version folders are left alone
    #[instrument(skip(self))]
    pub fn uninstall(&self) -> InstallReport {
        let mut warnings = Vec::new();
        let roots = self.discover_roots(&mut warnings);

        let mut targets = Vec::new();
        for version_dir in roots.iter().flat_map(|r| Self::version_dirs(r)) {
            let path = self.startup_script_path(&version_dir);
            match remove_if_present(&path) {
                Ok(true) => targets.push(path),
                Ok(false) => {}
                Err(e) => warnings.push(format!("Failed to remove {}: {}", path.display(), e)),
            }
        }

        info!(removed = targets.len(), "Startup script uninstall finished");
        InstallReport {
            installed_count: targets.len(),
            message: format!("Removed {} startup script(s)", targets.len()),
            targets,
            warnings,
        }
    }
}

/// Returns whether `path` holds `contents` afterwards
fn write_if_changed(path: &Path, contents: &str, warnings: &mut Vec<String>) -> bool {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            debug!(path = %path.display(), "Startup script already current");
            return true;
        }
    }

    match write_atomic(path, contents.as_bytes()) {
        Ok(()) => {
            info!(path = %path.display(), "Wrote startup script");
            true
        }
        Err(e) => {
            warnings.push(format!(
                "Failed to write startup script ({}): {}",
                path.display(),
                e
            ));
            false
        }
    }
}
