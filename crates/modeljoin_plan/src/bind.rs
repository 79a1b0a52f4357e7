//! Join relation application.

use indexmap::IndexSet;
use modeljoin_core::{Binding, IdMapping, JoinRelation, Language, Parameter};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why a relation was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No parameter with the target id
    MissingTarget,
    /// Another relation already binds this target
    DuplicateTarget,
    /// Source is not a parameter of the left model
    SourceNotInLeft,
    /// Target is not a parameter of the right model
    TargetNotInRight,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTarget => write!(f, "target parameter not found"),
            Self::DuplicateTarget => write!(f, "target already bound by an earlier relation"),
            Self::SourceNotInLeft => write!(f, "source is not a parameter of the left model"),
            Self::TargetNotInRight => write!(f, "target is not a parameter of the right model"),
        }
    }
}

/// A relation that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRelation {
    /// The relation as given
    pub relation: JoinRelation,
    /// Why it was skipped
    pub reason: DropReason,
}

impl DroppedRelation {
    pub(crate) fn new(relation: JoinRelation, reason: DropReason) -> Self {
        warn!(
            source = %relation.source_param,
            target = %relation.target_param,
            %reason,
            "Dropping join relation"
        );
        Self { relation, reason }
    }
}

/// Result of applying relations to a merged parameter list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Merged parameters without the bound targets
    pub parameters: Vec<Parameter>,
    /// Relations that were applied, in input order
    pub bindings: Vec<Binding>,
    /// Relations that were skipped
    pub dropped: Vec<DroppedRelation>,
}

/// Express a relation in the ids of the merged list.
///
/// Relations may be written against the left model's own ids. A source that
/// was renamed by conflict resolution is replaced by its new id, and so is
/// every reference to a renamed id inside the command: the original name no
/// longer exists in the session once the left child's variables are aliased.
#[must_use]
pub fn normalize_relation(
    relation: &JoinRelation,
    mapping: &IdMapping,
    language: Language,
) -> JoinRelation {
    let mut normalized = relation.clone();
    if let Some(renamed) = mapping.get(&relation.source_param) {
        normalized.source_param = renamed.clone();
    }
    normalized.command = rename_identifiers(&relation.command, mapping, language);
    normalized
}

/// Replace every identifier of `command` that `mapping` renames.
///
/// String literals, numbers and member accesses (`l$x` in R, `o.x` in
/// Python) are left alone. Each identifier is looked up once, so chained
/// renames are not applied twice.
#[must_use]
pub fn rename_identifiers(command: &str, mapping: &IdMapping, language: Language) -> String {
    if mapping.is_empty() {
        return command.to_string();
    }
    let is_ident =
        |c: char| c.is_alphanumeric() || c == '_' || (c == '.' && language == Language::R);
    let chars: Vec<(usize, char)> = command.char_indices().collect();
    let end_of = |j: usize| chars.get(j).map_or(command.len(), |(k, _)| *k);

    let mut out = String::with_capacity(command.len());
    let mut prev: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let (start, c) = chars[i];
        if c == '"' || c == '\'' || (c == '`' && language == Language::R) {
            let mut j = i + 1;
            let mut escaped = false;
            while j < chars.len() {
                let d = chars[j].1;
                j += 1;
                if escaped {
                    escaped = false;
                } else if d == '\\' {
                    escaped = true;
                } else if d == c {
                    break;
                }
            }
            out.push_str(&command[start..end_of(j)]);
            prev = Some(c);
            i = j;
        } else if is_ident(c) {
            let mut j = i + 1;
            while j < chars.len() && is_ident(chars[j].1) {
                j += 1;
            }
            let token = &command[start..end_of(j)];
            let member = matches!(
                (language, prev),
                (Language::R, Some('$' | '@')) | (Language::Python, Some('.'))
            );
            match mapping.get(token) {
                Some(renamed) if !member && !c.is_ascii_digit() => out.push_str(renamed.as_str()),
                _ => out.push_str(token),
            }
            prev = Some(chars[j - 1].1);
            i = j;
        } else {
            out.push(c);
            prev = Some(c);
            i += 1;
        }
    }
    out
}

/// Apply normalized `relations` to `merged`.
///
/// Every relation whose target is found removes that parameter from the list
/// and yields a [`Binding`]. A missing target, or a target already bound by an
/// earlier relation, drops the relation with a warning instead of failing.
#[must_use]
pub fn apply_relations(relations: &[JoinRelation], merged: Vec<Parameter>) -> Application {
    let mut parameters = merged;
    let mut bindings = Vec::new();
    let mut dropped = Vec::new();
    let mut bound: IndexSet<String> = IndexSet::new();

    for relation in relations {
        let relation = relation.clone();

        if bound.contains(relation.target_param.as_str()) {
            dropped.push(DroppedRelation::new(relation, DropReason::DuplicateTarget));
            continue;
        }

        let Some(index) = parameters
            .iter()
            .position(|p| p.id == relation.target_param)
        else {
            dropped.push(DroppedRelation::new(relation, DropReason::MissingTarget));
            continue;
        };

        let target = parameters.remove(index);
        bound.insert(target.id.as_str().to_string());
        bindings.push(Binding {
            source: relation.source_param,
            target: target.id,
            command: relation.command,
            target_type: target.data_type,
        });
    }

    Application {
        parameters,
        bindings,
        dropped,
    }
}
