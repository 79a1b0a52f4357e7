//! Join relations between two models.

use crate::id::ParameterId;
use crate::parameter::DataType;
use serde::{Deserialize, Deserializer, Serialize};

/// Declarative binding: the value of `target_param` is produced by
/// evaluating `command`, which may reference `source_param`.
///
/// Only meaningful between a parameter of the left child (source) and a
/// parameter of the right child (target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRelation {
    /// Parameter of the left model
    #[serde(deserialize_with = "parameter_ref")]
    pub source_param: ParameterId,
    /// Parameter of the right model
    #[serde(deserialize_with = "parameter_ref")]
    pub target_param: ParameterId,
    /// Expression evaluated in the interpreter to produce the target value
    #[serde(default)]
    pub command: String,
}

impl JoinRelation {
    /// Create a relation
    #[must_use]
    pub fn new(
        source: impl Into<ParameterId>,
        target: impl Into<ParameterId>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            source_param: source.into(),
            target_param: target.into(),
            command: command.into(),
        }
    }

    /// Direct value passing: the target takes the source value unchanged
    #[must_use]
    pub fn direct(source: impl Into<ParameterId>, target: impl Into<ParameterId>) -> Self {
        let source = source.into();
        let command = source.as_str().to_string();
        Self::new(source, target, command)
    }
}

/// A relation after it was applied to a merged parameter list.
///
/// The target is no longer a free parameter of the composite; its value is
/// produced by `command` once the left child has executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Source parameter id as exposed by the left child
    pub source: ParameterId,
    /// Target parameter id in the right child
    pub target: ParameterId,
    /// Value transform
    pub command: String,
    /// Declared type of the target
    pub target_type: DataType,
}

impl Binding {
    /// Whether the bound value is a path into the source model's directory
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.target_type == DataType::File
    }
}

/// Persisted relations reference parameters either by id or by embedding the
/// whole parameter object; only the id of an embedded object is kept.
#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterRef {
    Id(ParameterId),
    Legacy {
        #[serde(rename = "parameterID")]
        id: ParameterId,
    },
    Minimal {
        id: ParameterId,
    },
}

fn parameter_ref<'de, D>(deserializer: D) -> Result<ParameterId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ParameterRef::deserialize(deserializer)? {
        ParameterRef::Id(id) => id,
        ParameterRef::Legacy { id } | ParameterRef::Minimal { id } => id,
    })
}

/// Parse a persisted join configuration: a JSON array of relations
///
/// # Errors
///
/// Returns error if the document is not a valid relation array
pub fn parse_relations(json: &str) -> crate::CoreResult<Vec<JoinRelation>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(json)?)
}

/// Serialize relations to the persisted JSON array form
///
/// # Errors
///
/// Returns error if serialization fails
pub fn relations_to_json(relations: &[JoinRelation]) -> crate::CoreResult<String> {
    Ok(serde_json::to_string_pretty(relations)?)
}
