//! Resource propagation between working directories.
//!
//! Files are compared by modification time and length, keyed by their path
//! relative to the directory root. Only files that are new or changed since
//! the snapshot are copied, with their relative sub-directories recreated.

use crate::error::RunWarning;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Modification stamp of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    /// Last modification time
    pub modified: SystemTime,
    /// Size in bytes
    pub len: u64,
}

/// Stamps of every regular file under a directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSnapshot {
    files: IndexMap<PathBuf, FileStamp>,
}

impl ResourceSnapshot {
    /// Walk `root` and record every regular file; a missing root is empty
    #[must_use]
    pub fn capture(root: &Path) -> Self {
        let mut files = IndexMap::new();
        if !root.is_dir() {
            return Self { files };
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            files.insert(
                relative.to_path_buf(),
                FileStamp {
                    modified,
                    len: metadata.len(),
                },
            );
        }
        Self { files }
    }

    /// Number of files recorded
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no file was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Stamp of a relative path
    #[must_use]
    pub fn get(&self, relative: &Path) -> Option<&FileStamp> {
        self.files.get(relative)
    }

    /// Relative paths that are new or changed compared to `before`
    #[must_use]
    pub fn changed_since(&self, before: &ResourceSnapshot) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|(path, stamp)| before.files.get(*path) != Some(*stamp))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

/// Result of one propagation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Propagation {
    /// Relative paths copied
    pub copied: Vec<PathBuf>,
    /// Files that could not be copied
    pub warnings: Vec<RunWarning>,
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Copies resources produced by one model into another model's directory
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourcePropagator;

impl ResourcePropagator {
    /// Copy every file under `source` that is new or changed since `before`
    /// into `target`. Nothing happens when both are the same directory.
    /// Copy failures are reported per file and do not stop the others.
    #[must_use]
    pub fn propagate(before: &ResourceSnapshot, source: &Path, target: &Path) -> Propagation {
        let mut result = Propagation::default();
        if same_dir(source, target) {
            debug!(dir = %source.display(), "Shared working directory, nothing to propagate");
            return result;
        }

        let after = ResourceSnapshot::capture(source);
        for relative in after.changed_since(before) {
            let from = source.join(&relative);
            let to = target.join(&relative);
            let copied = to
                .parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|()| std::fs::copy(&from, &to));
            match copied {
                Ok(_) => {
                    debug!(file = %relative.display(), "Propagated resource");
                    result.copied.push(relative);
                }
                Err(e) => {
                    warn!(file = %from.display(), error = %e, "Failed to propagate resource");
                    result.warnings.push(RunWarning::ResourceCopy {
                        path: from,
                        reason: e.to_string(),
                    });
                }
            }
        }
        result
    }
}
