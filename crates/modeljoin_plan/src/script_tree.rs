//! Script tree documents.
//!
//! An external editor gets the scripts of a combined model as a nested tree
//! that mirrors the composition: a leaf node carries the leaf's model script,
//! a composite node has exactly three children, `[left, join, right]`, and
//! the join node carries the composite's join assignments. Edited trees are
//! written back without flattening.

use crate::bind::rename_identifiers;
use modeljoin_core::{Language, Model, NodeId, ParameterId};
use serde::{Deserialize, Serialize};

/// Display text of the join marker node
pub const JOIN_NODE_TEXT: &str = "Joining Script";

/// One node of a script tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptNode {
    /// Node id
    pub id: String,
    /// Display text
    pub text: String,
    /// Script body
    #[serde(default)]
    pub script: String,
    /// Children of a composite node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<ScriptNode>>,
}

/// Error writing a script tree back into a model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptTreeError {
    /// Tree shape does not match the model at this node
    #[error("script tree node '{node}' expected {expected} children, found {found}")]
    ShapeMismatch {
        /// Node text
        node: String,
        /// Expected number of children
        expected: usize,
        /// Actual number of children
        found: usize,
    },
    /// Join line is not an assignment
    #[error("malformed join line in '{node}': {line}")]
    MalformedJoinLine {
        /// Node text
        node: String,
        /// Offending line
        line: String,
    },
    /// Join line assigns a parameter that is not bound
    #[error("join line in '{node}' assigns unbound parameter '{target}'")]
    UnknownTarget {
        /// Node text
        node: String,
        /// Assigned id
        target: String,
    },
}

/// Render one join assignment
#[must_use]
pub fn join_line(language: Language, target: &ParameterId, command: &str) -> String {
    match language {
        Language::R => format!("{} <- {};", target, command),
        Language::Python => format!("{} = {}", target, command),
    }
}

/// Split a join assignment into `(target, command)`
#[must_use]
pub fn parse_join_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim().trim_end_matches(';').trim_end();
    let (target, command) = line.split_once("<-").or_else(|| line.split_once('='))?;
    let (target, command) = (target.trim(), command.trim());
    if target.is_empty() || command.is_empty() || target.contains(char::is_whitespace) {
        return None;
    }
    Some((target, command))
}

/// Build the script tree of a model
#[must_use]
pub fn build(model: &Model) -> ScriptNode {
    match model {
        Model::Leaf(leaf) => ScriptNode {
            id: NodeId::new().to_string(),
            text: leaf.name.clone(),
            script: leaf.script.clone(),
            nodes: None,
        },
        Model::Combined(combined) => {
            let language = model.language();
            let script = combined
                .bindings
                .iter()
                .map(|b| join_line(language, &b.target, &b.command) + "\n")
                .collect::<String>();
            let join = ScriptNode {
                id: NodeId::new().to_string(),
                text: JOIN_NODE_TEXT.to_string(),
                script,
                nodes: None,
            };
            ScriptNode {
                id: NodeId::new().to_string(),
                text: combined.name.clone(),
                script: String::new(),
                nodes: Some(vec![build(&combined.left), join, build(&combined.right)]),
            }
        }
    }
}

/// Write an edited tree back into `model`.
///
/// Leaf scripts are replaced, and each line of a join node updates the
/// command of the binding (and relation) with that target. Commands may name
/// the left model's original ids; they are rewritten to the renamed ids. Nothing is written unless the
/// whole tree applies.
///
/// # Errors
///
/// Returns error if the tree shape differs from the model, or a join line is
/// malformed or names an unbound target
pub fn apply(model: &mut Model, tree: &ScriptNode) -> Result<(), ScriptTreeError> {
    let mut edited = model.clone();
    apply_node(&mut edited, tree)?;
    *model = edited;
    Ok(())
}

fn apply_node(model: &mut Model, tree: &ScriptNode) -> Result<(), ScriptTreeError> {
    let children = tree.nodes.as_deref().unwrap_or_default();
    let language = model.language();
    match model {
        Model::Leaf(leaf) => {
            if !children.is_empty() {
                return Err(ScriptTreeError::ShapeMismatch {
                    node: tree.text.clone(),
                    expected: 0,
                    found: children.len(),
                });
            }
            leaf.script = tree.script.clone();
            Ok(())
        }
        Model::Combined(combined) => {
            let [left, join, right] = children else {
                return Err(ScriptTreeError::ShapeMismatch {
                    node: tree.text.clone(),
                    expected: 3,
                    found: children.len(),
                });
            };
            apply_node(&mut combined.left, left)?;
            apply_node(&mut combined.right, right)?;

            for line in join.script.lines().filter(|l| !l.trim().is_empty()) {
                let (target, command) =
                    parse_join_line(line).ok_or_else(|| ScriptTreeError::MalformedJoinLine {
                        node: tree.text.clone(),
                        line: line.to_string(),
                    })?;
                let command = rename_identifiers(command, &combined.id_mapping, language);
                let binding = combined
                    .bindings
                    .iter_mut()
                    .find(|b| b.target.as_str() == target)
                    .ok_or_else(|| ScriptTreeError::UnknownTarget {
                        node: tree.text.clone(),
                        target: target.to_string(),
                    })?;
                binding.command.clone_from(&command);
                if let Some(relation) = combined
                    .join_relations
                    .iter_mut()
                    .find(|r| r.target_param.as_str() == target)
                {
                    relation.command = command;
                }
            }
            Ok(())
        }
    }
}
