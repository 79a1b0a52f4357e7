//! Persisted join settings and parameter documents.

use crate::script_tree::{self, ScriptNode};
use modeljoin_core::{CombinedModel, CoreResult, JoinRelation, Model, Parameter};
use serde::{Deserialize, Serialize};

/// The JSON documents a join is saved as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSettings {
    /// Relations as configured
    #[serde(default)]
    pub join_relations: Vec<JoinRelation>,
    /// Merged parameter metadata
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Script tree of the combined model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_tree: Option<ScriptNode>,
}

impl JoinSettings {
    /// Capture the settings of a combined model
    #[must_use]
    pub fn from_model(model: &CombinedModel) -> Self {
        let tree = script_tree::build(&Model::Combined(model.clone()));
        Self {
            join_relations: model.join_relations.clone(),
            parameters: model.merged_parameters.clone(),
            script_tree: Some(tree),
        }
    }

    /// Parse settings
    ///
    /// # Errors
    ///
    /// Returns error if the document is malformed
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize settings
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterDocument {
    List(Vec<Parameter>),
    Wrapped { parameters: Vec<Parameter> },
}

/// Parse a parameter metadata document: a bare array or `{"parameters": [..]}`
///
/// # Errors
///
/// Returns error if the document is malformed
pub fn parse_parameters(json: &str) -> CoreResult<Vec<Parameter>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_str(json)? {
        ParameterDocument::List(parameters) | ParameterDocument::Wrapped { parameters } => {
            parameters
        }
    })
}

/// Serialize a parameter list as a metadata document
///
/// # Errors
///
/// Returns error if serialization fails
pub fn parameters_to_json(parameters: &[Parameter]) -> CoreResult<String> {
    Ok(serde_json::to_string_pretty(parameters)?)
}
