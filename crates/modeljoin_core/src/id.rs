//! Identifiers for MODELJOIN entities.
//!
//! Parameter ids are the user-authored names scripts refer to. Run and node
//! ids are UUIDs and are serialized in canonical format.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

/// Parameter identifier - the name a script binds a value to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(String);

impl ParameterId {
    /// Create a parameter id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return a copy with `suffix` appended
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self(format!("{}{}", self.0, suffix))
    }

    /// Whether the id already carries `suffix`
    #[must_use]
    pub fn has_suffix(&self, suffix: &str) -> bool {
        !suffix.is_empty() && self.0.ends_with(suffix)
    }
}

impl std::fmt::Display for ParameterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParameterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParameterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ParameterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ParameterId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Renames applied by conflict resolution: original id -> renamed id
pub type IdMapping = indexmap::IndexMap<ParameterId, ParameterId>;

/// Run identifier - identifies a single top-level execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_{}", self.0)
    }
}

/// Node identifier - identifies a node of an exported script tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random NodeId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get as UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parameter_id_suffix() {
        let id = ParameterId::new("dose");
        let renamed = id.with_suffix("_dup");
        assert_eq!(renamed.as_str(), "dose_dup");
        assert!(renamed.has_suffix("_dup"));
        assert!(!id.has_suffix("_dup"));
        assert!(!id.has_suffix(""));
    }

    #[test]
    fn test_parameter_id_borrow_lookup() {
        let mut set = HashSet::new();
        set.insert(ParameterId::from("x"));
        assert!(set.contains("x"));
        assert!(!set.contains("y"));
    }

    #[test]
    fn test_parameter_id_serializes_as_string() {
        let id = ParameterId::from("time");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"time\"");
        let back: ParameterId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_run_id_unique() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("run_"));
    }

    #[test]
    fn test_node_id_display() {
        let id = NodeId::new();
        assert!(id.to_string().starts_with("node_"));
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }
}
