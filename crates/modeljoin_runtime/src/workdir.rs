//! Working directory resolution.
//!
//! A model declares its working directory as a path or `file:` URI. Nodes
//! without one share their parent's directory; the root gets a fresh
//! temporary directory. The result is a [`Layout`] tree mirroring the model.

use crate::error::ExecutionError;
use modeljoin_core::Model;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of temporary working directories
pub const TEMP_PREFIX: &str = "modeljoin";

/// Resolved directories of a model tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// A leaf runs in `dir`
    Leaf {
        /// Working directory
        dir: PathBuf,
    },
    /// A composite and its children
    Combined {
        /// Working directory of the composite itself
        dir: PathBuf,
        /// Left child layout
        left: Box<Layout>,
        /// Right child layout
        right: Box<Layout>,
    },
}

impl Layout {
    /// Directory of this node
    #[must_use]
    pub fn dir(&self) -> &Path {
        match self {
            Self::Leaf { dir } | Self::Combined { dir, .. } => dir,
        }
    }

    /// Directory of the first leaf to run
    #[must_use]
    pub fn entry_dir(&self) -> &Path {
        match self {
            Self::Leaf { dir } => dir,
            Self::Combined { left, .. } => left.entry_dir(),
        }
    }

    /// Directory of the last leaf to run, where its resources end up
    #[must_use]
    pub fn exit_dir(&self) -> &Path {
        match self {
            Self::Leaf { dir } => dir,
            Self::Combined { right, .. } => right.exit_dir(),
        }
    }
}

/// Strip a `file:` scheme from a declared location
#[must_use]
pub fn declared_path(declared: &str) -> PathBuf {
    let trimmed = declared.trim();
    let path = trimmed
        .strip_prefix("file://")
        .or_else(|| trimmed.strip_prefix("file:"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

/// Create a fresh temporary directory that outlives the run
///
/// # Errors
///
/// Returns error if the directory cannot be created
pub fn temp_dir() -> Result<PathBuf, ExecutionError> {
    let dir = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir()
        .map_err(|e| ExecutionError::WorkingDirectory {
            path: std::env::temp_dir().display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(dir.keep())
}

fn ensure(path: PathBuf) -> Result<PathBuf, ExecutionError> {
    std::fs::create_dir_all(&path).map_err(|e| ExecutionError::WorkingDirectory {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(path)
}

fn resolve_one(declared: Option<&str>, inherited: Option<&Path>) -> Result<PathBuf, ExecutionError> {
    match (declared.filter(|d| !d.trim().is_empty()), inherited) {
        (Some(declared), _) => ensure(declared_path(declared)),
        (None, Some(parent)) => Ok(parent.to_path_buf()),
        (None, None) => temp_dir(),
    }
}

/// Resolve the directories of every node of `model`
///
/// # Errors
///
/// Returns error if a declared directory cannot be created
pub fn resolve_layout(model: &Model, inherited: Option<&Path>) -> Result<Layout, ExecutionError> {
    let dir = resolve_one(model.working_directory(), inherited)?;
    debug!(model = model.name(), dir = %dir.display(), "Resolved working directory");
    match model {
        Model::Leaf(_) => Ok(Layout::Leaf { dir }),
        Model::Combined(combined) => {
            let left = resolve_layout(&combined.left, Some(&dir))?;
            let right = resolve_layout(&combined.right, Some(&dir))?;
            Ok(Layout::Combined {
                dir,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}
