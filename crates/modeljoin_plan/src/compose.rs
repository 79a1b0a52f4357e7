//! Composer: pairs two models into a [`CombinedModel`].

use crate::bind::{apply_relations, normalize_relation, DropReason, DroppedRelation};
use crate::conflict::{ConflictError, ConflictResolver, ConflictStrategy, DEFAULT_SUFFIX};
use crate::validate::{ValidationError, Validator};
use modeljoin_core::{
    parameter, CombinedModel, CoreError, JoinRelation, Model, Parameter, Simulation,
    DEFAULT_SIMULATION,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Composer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Suffix appended to colliding left ids
    pub suffix: String,
    /// Residual collision handling
    pub strategy: ConflictStrategy,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_SUFFIX.to_string(),
            strategy: ConflictStrategy::default(),
        }
    }
}

/// Output from composing two models
#[derive(Debug, Clone)]
pub struct CompositionOutput {
    /// The combined model
    pub model: CombinedModel,
    /// Composition warnings
    pub warnings: Vec<CompositionWarning>,
}

/// Composition warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionWarning {
    /// A relation was not applied
    DroppedRelation(DroppedRelation),
}

impl std::fmt::Display for CompositionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DroppedRelation(d) => write!(
                f,
                "relation {} -> {} dropped: {}",
                d.relation.source_param, d.relation.target_param, d.reason
            ),
        }
    }
}

/// Composition error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    /// Ids could not be made unique
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    /// The combined model is inconsistent
    #[error("invalid composition: {}", summarize(.0))]
    Invalid(Vec<ValidationError>),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<CompositionError> for CoreError {
    fn from(err: CompositionError) -> Self {
        CoreError::Validation {
            field: "composition".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Builds combined models
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    /// Create a composer with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a composer with a configuration
    #[must_use]
    pub fn with_config(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Combine `left` and `right` under `relations`.
    ///
    /// Colliding left ids are renamed, relations are applied to the merged
    /// list, packages are unioned, and every node of the resulting tree gets
    /// a synthesized default simulation at index 0.
    ///
    /// # Errors
    ///
    /// Returns error if ids cannot be made unique or the result fails validation
    pub fn compose(
        &self,
        name: impl Into<String>,
        left: Model,
        right: Model,
        relations: &[JoinRelation],
    ) -> Result<CompositionOutput, CompositionError> {
        let name = name.into();
        let resolver = ConflictResolver::new()
            .with_suffix(self.config.suffix.clone())
            .with_strategy(self.config.strategy);
        let resolution = resolver.resolve(left.parameters(), right.parameters())?;
        debug!(renamed = resolution.mapping.len(), "Resolved parameter conflicts");

        let mut warnings = Vec::new();
        let mut accepted = Vec::new();
        for relation in relations {
            let normalized = normalize_relation(relation, &resolution.mapping, left.language());
            if parameter::find(&resolution.parameters, normalized.source_param.as_str()).is_none()
            {
                warnings.push(CompositionWarning::DroppedRelation(DroppedRelation::new(
                    normalized,
                    DropReason::SourceNotInLeft,
                )));
                continue;
            }
            if parameter::find(right.parameters(), normalized.target_param.as_str()).is_none()
                && parameter::find(&resolution.parameters, normalized.target_param.as_str())
                    .is_some()
            {
                warnings.push(CompositionWarning::DroppedRelation(DroppedRelation::new(
                    normalized,
                    DropReason::TargetNotInRight,
                )));
                continue;
            }
            accepted.push(normalized);
        }

        let mut merged = resolution.parameters;
        merged.extend(right.parameters().iter().cloned());
        let application = apply_relations(&accepted, merged);
        warnings.extend(
            application
                .dropped
                .into_iter()
                .map(CompositionWarning::DroppedRelation),
        );

        let mut packages = left.packages().clone();
        packages.extend(right.packages().iter().cloned());

        let mut model = CombinedModel {
            name,
            left: Box::new(left),
            right: Box::new(right),
            join_relations: accepted,
            bindings: application.bindings,
            id_mapping: resolution.mapping,
            merged_parameters: application.parameters,
            packages,
            working_directory: None,
            simulations: Vec::new(),
            selected_simulation: 0,
        };
        synthesize_defaults(&mut model.left);
        synthesize_defaults(&mut model.right);
        install_default(
            &model.merged_parameters,
            &mut model.simulations,
            &mut model.selected_simulation,
        );

        Validator::new()
            .validate_combined(&model)
            .map_err(CompositionError::Invalid)?;

        info!(
            model = %model.name,
            parameters = model.merged_parameters.len(),
            bindings = model.bindings.len(),
            dropped = warnings.len(),
            "Composed models"
        );
        Ok(CompositionOutput { model, warnings })
    }
}

/// Give every node of the tree a default simulation at index 0.
///
/// The default is built from the node's own exposed parameters. It replaces
/// an existing simulation named `default` at index 0, or is inserted in front
/// of the node's other simulations, whose selection index is shifted to keep
/// pointing at the same simulation.
pub fn synthesize_defaults(model: &mut Model) {
    match model {
        Model::Leaf(leaf) => install_default(
            &leaf.parameters,
            &mut leaf.simulations,
            &mut leaf.selected_simulation,
        ),
        Model::Combined(combined) => {
            synthesize_defaults(&mut combined.left);
            synthesize_defaults(&mut combined.right);
            install_default(
                &combined.merged_parameters,
                &mut combined.simulations,
                &mut combined.selected_simulation,
            );
        }
    }
}

fn install_default(
    parameters: &[Parameter],
    simulations: &mut Vec<Simulation>,
    selected: &mut usize,
) {
    let default = Simulation::synthesize_default(parameters);
    match simulations.first() {
        Some(first) if first.name == DEFAULT_SIMULATION => simulations[0] = default,
        Some(_) => {
            simulations.insert(0, default);
            *selected += 1;
        }
        None => {
            simulations.push(default);
            *selected = 0;
        }
    }
}
