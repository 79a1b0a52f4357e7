//! Model tree validator.
//!
//! Composed models are valid by construction, but model documents are also
//! loaded from disk and edited by hand, so the runtime validates them again
//! before executing anything.

use indexmap::IndexSet;
use modeljoin_core::{parameter, CombinedModel, Language, Model, ParameterId};

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Two exposed parameters share an id
    #[error("duplicate parameter id '{id}' in '{node}'")]
    DuplicateParameter {
        /// Model name
        node: String,
        /// Colliding id
        id: ParameterId,
    },
    /// Binding source does not exist in the left child
    #[error("binding source '{param}' is not a parameter of the left model of '{node}'")]
    SourceNotInLeft {
        /// Model name
        node: String,
        /// Source id
        param: ParameterId,
    },
    /// Binding target does not exist in the right child
    #[error("binding target '{param}' is not a parameter of the right model of '{node}'")]
    TargetNotInRight {
        /// Model name
        node: String,
        /// Target id
        param: ParameterId,
    },
    /// Two bindings write the same target
    #[error("parameter '{param}' is bound twice in '{node}'")]
    DuplicateTarget {
        /// Model name
        node: String,
        /// Target id
        param: ParameterId,
    },
    /// A bound target is still listed as a free parameter
    #[error("bound parameter '{param}' is still exposed by '{node}'")]
    BoundTargetExposed {
        /// Model name
        node: String,
        /// Target id
        param: ParameterId,
    },
    /// Leaves of one tree use different languages
    #[error("leaf '{leaf}' uses {found} but the model runs {expected}")]
    MixedLanguages {
        /// Offending leaf
        leaf: String,
        /// Language of the first leaf
        expected: Language,
        /// Language of the offending leaf
        found: Language,
    },
    /// Selected simulation does not exist
    #[error("'{node}' selects simulation {index} but has {count}")]
    SimulationOutOfRange {
        /// Model name
        node: String,
        /// Selected index
        index: usize,
        /// Number of simulations
        count: usize,
    },
}

/// Validator for model trees
#[derive(Debug, Clone)]
pub struct Validator {
    /// Require one language across all leaves
    pub single_language: bool,
}

impl Validator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            single_language: true,
        }
    }

    /// Validate a model tree, collecting every problem
    ///
    /// # Errors
    ///
    /// Returns all validation errors found
    pub fn validate(&self, model: &Model) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        self.check_node(model, &mut errors);
        if self.single_language {
            Self::check_languages(model, &mut errors);
        }
        finish(errors)
    }

    /// Validate a combined model, collecting every problem
    ///
    /// # Errors
    ///
    /// Returns all validation errors found
    pub fn validate_combined(&self, combined: &CombinedModel) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        self.check_combined(combined, &mut errors);
        if self.single_language {
            let expected = combined.left.language();
            Self::check_leaf_languages(&combined.left, expected, &mut errors);
            Self::check_leaf_languages(&combined.right, expected, &mut errors);
        }
        finish(errors)
    }

    fn check_node(&self, model: &Model, errors: &mut Vec<ValidationError>) {
        match model {
            Model::Leaf(leaf) => {
                check_parameters(&leaf.name, &leaf.parameters, errors);
                check_selection(model, errors);
            }
            Model::Combined(combined) => self.check_combined(combined, errors),
        }
    }

    fn check_combined(&self, combined: &CombinedModel, errors: &mut Vec<ValidationError>) {
        self.check_node(&combined.left, errors);
        self.check_node(&combined.right, errors);

        let node = &combined.name;
        check_parameters(node, &combined.merged_parameters, errors);

        let mut bound = IndexSet::new();
        for binding in &combined.bindings {
            let original = combined.original_left_id(&binding.source);
            if parameter::find(combined.left.parameters(), original.as_str()).is_none() {
                errors.push(ValidationError::SourceNotInLeft {
                    node: node.clone(),
                    param: binding.source.clone(),
                });
            }
            if parameter::find(combined.right.parameters(), binding.target.as_str()).is_none() {
                errors.push(ValidationError::TargetNotInRight {
                    node: node.clone(),
                    param: binding.target.clone(),
                });
            }
            if !bound.insert(binding.target.as_str()) {
                errors.push(ValidationError::DuplicateTarget {
                    node: node.clone(),
                    param: binding.target.clone(),
                });
            }
            if parameter::find(&combined.merged_parameters, binding.target.as_str()).is_some() {
                errors.push(ValidationError::BoundTargetExposed {
                    node: node.clone(),
                    param: binding.target.clone(),
                });
            }
        }

        if !combined.simulations.is_empty()
            && combined.selected_simulation >= combined.simulations.len()
        {
            errors.push(ValidationError::SimulationOutOfRange {
                node: node.clone(),
                index: combined.selected_simulation,
                count: combined.simulations.len(),
            });
        }
    }

    fn check_languages(model: &Model, errors: &mut Vec<ValidationError>) {
        Self::check_leaf_languages(model, model.language(), errors);
    }

    fn check_leaf_languages(model: &Model, expected: Language, errors: &mut Vec<ValidationError>) {
        for leaf in model.leaves() {
            if leaf.language != expected {
                errors.push(ValidationError::MixedLanguages {
                    leaf: leaf.name.clone(),
                    expected,
                    found: leaf.language,
                });
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_parameters(
    node: &str,
    parameters: &[modeljoin_core::Parameter],
    errors: &mut Vec<ValidationError>,
) {
    for id in parameter::duplicate_ids(parameters) {
        errors.push(ValidationError::DuplicateParameter {
            node: node.to_string(),
            id,
        });
    }
}

fn check_selection(model: &Model, errors: &mut Vec<ValidationError>) {
    let count = model.simulations().len();
    let index = model.selected_simulation();
    if count > 0 && index >= count {
        errors.push(ValidationError::SimulationOutOfRange {
            node: model.name().to_string(),
            index,
            count,
        });
    }
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
