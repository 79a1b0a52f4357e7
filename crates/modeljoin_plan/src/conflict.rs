//! Parameter id conflict resolution.
//!
//! Two models authored independently may declare parameters with the same id.
//! Before their lists are merged, colliding left ids are renamed by appending
//! a suffix. The rename happens on a copy and the caller gets back an explicit
//! `original -> renamed` mapping.

use indexmap::IndexSet;
use modeljoin_core::{CoreError, IdMapping, Parameter, ParameterId};
use serde::{Deserialize, Serialize};

/// Suffix appended to colliding left ids
pub const DEFAULT_SUFFIX: &str = "_dup";

/// What to do when a single suffix does not make an id unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Keep appending the suffix until the id is unique
    #[default]
    LoopUntilStable,
    /// Report the residual collision
    FailFast,
}

/// Conflict resolution error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    /// Renaming once left the id colliding
    #[error("parameter '{original}' still collides after renaming to '{renamed}'")]
    Residual {
        /// Id before renaming
        original: ParameterId,
        /// Id that still collides
        renamed: ParameterId,
    },
    /// An empty suffix can never resolve a collision
    #[error("rename suffix must not be empty")]
    EmptySuffix,
}

impl From<ConflictError> for CoreError {
    fn from(err: ConflictError) -> Self {
        CoreError::Validation {
            field: "parameters".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Renamed left parameters plus the renames that were applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Copy of the left list with colliding ids (and names) suffixed
    pub parameters: Vec<Parameter>,
    /// `original -> renamed` for every parameter that was renamed
    pub mapping: IdMapping,
}

/// Detects and renames colliding parameter ids
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    suffix: String,
    strategy: ConflictStrategy,
}

impl ConflictResolver {
    /// Create a resolver with the default suffix and strategy
    #[must_use]
    pub fn new() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            strategy: ConflictStrategy::default(),
        }
    }

    /// Set the suffix
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the strategy for residual collisions
    #[must_use]
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Rename every left parameter whose id also occurs in `right`.
    ///
    /// `left` is not modified. Parameters that do not collide keep their id,
    /// so resolving an already resolved list against the same right list is a
    /// no-op with an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns error if the suffix is empty, or with [`ConflictStrategy::FailFast`]
    /// if one suffix leaves the id colliding
    pub fn resolve(
        &self,
        left: &[Parameter],
        right: &[Parameter],
    ) -> Result<Resolution, ConflictError> {
        if self.suffix.is_empty() {
            return Err(ConflictError::EmptySuffix);
        }

        let right_ids: IndexSet<&str> = right.iter().map(|p| p.id.as_str()).collect();
        let mut taken: IndexSet<String> = right
            .iter()
            .chain(left.iter())
            .map(|p| p.id.as_str().to_string())
            .collect();

        let mut parameters = left.to_vec();
        let mut mapping = IdMapping::new();

        for param in &mut parameters {
            if !right_ids.contains(param.id.as_str()) {
                continue;
            }

            let original = param.id.clone();
            let renamed = self.rename(&original, &taken)?;
            let added = &renamed.as_str()[original.as_str().len()..];

            param.name.push_str(added);
            param.id = renamed.clone();
            taken.insert(renamed.as_str().to_string());
            mapping.insert(original, renamed);
        }

        Ok(Resolution {
            parameters,
            mapping,
        })
    }

    fn rename(
        &self,
        original: &ParameterId,
        taken: &IndexSet<String>,
    ) -> Result<ParameterId, ConflictError> {
        let mut candidate = original.with_suffix(&self.suffix);
        match self.strategy {
            ConflictStrategy::FailFast => {
                if original.has_suffix(&self.suffix) || taken.contains(candidate.as_str()) {
                    return Err(ConflictError::Residual {
                        original: original.clone(),
                        renamed: candidate,
                    });
                }
            }
            ConflictStrategy::LoopUntilStable => {
                while taken.contains(candidate.as_str()) {
                    candidate = candidate.with_suffix(&self.suffix);
                }
            }
        }
        Ok(candidate)
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}
