//! The model tree.
//!
//! A [`Model`] is either a leaf (one script with its parameters) or a
//! [`CombinedModel`] holding two child models, which makes the structure a
//! binary tree of arbitrary depth. Combined models are built by the planner;
//! this module only holds the data and read-only traversal helpers.

use crate::id::{IdMapping, ParameterId};
use crate::parameter::Parameter;
use crate::relation::{Binding, JoinRelation};
use crate::simulation::Simulation;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Script language of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// GNU R
    #[default]
    #[serde(alias = "R")]
    R,
    /// Python 3
    #[serde(alias = "Python", alias = "py")]
    Python,
}

impl Language {
    /// Detect a language from a free-form label such as "R 3.4" or "python3".
    /// Unknown labels fall back to R.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.trim().to_ascii_lowercase().starts_with("py") {
            Self::Python
        } else {
            Self::R
        }
    }

    /// Script file extension
    #[must_use]
    pub const fn file_extension(self) -> &'static str {
        match self {
            Self::R => "r",
            Self::Python => "py",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::R => write!(f, "R"),
            Self::Python => write!(f, "Python"),
        }
    }
}

/// A single independently authored model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafModel {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Script language
    #[serde(default)]
    pub language: Language,
    /// Model script
    #[serde(default)]
    pub script: String,
    /// Visualization script
    #[serde(default)]
    pub viz_script: String,
    /// Declared parameters
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Packages the scripts need
    #[serde(default)]
    pub packages: IndexSet<String>,
    /// Declared working directory (path or `file:` URI); resolved at run time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Run configurations; index 0 is the default
    #[serde(default)]
    pub simulations: Vec<Simulation>,
    /// Index of the simulation used when this model runs as a child
    #[serde(default)]
    pub selected_simulation: usize,
}

impl LeafModel {
    /// Create a model with a script and no parameters
    #[must_use]
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: Language::default(),
            script: script.into(),
            viz_script: String::new(),
            parameters: Vec::new(),
            packages: IndexSet::new(),
            working_directory: None,
            simulations: Vec::new(),
            selected_simulation: 0,
        }
    }

    /// Set the language
    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Add a parameter
    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the visualization script
    #[must_use]
    pub fn with_viz(mut self, viz: impl Into<String>) -> Self {
        self.viz_script = viz.into();
        self
    }

    /// Add a package requirement
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.packages.insert(package.into());
        self
    }

    /// Set the declared working directory
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Add a simulation
    #[must_use]
    pub fn with_simulation(mut self, simulation: Simulation) -> Self {
        self.simulations.push(simulation);
        self
    }
}

/// Binary composition node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedModel {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Executed first
    pub left: Box<Model>,
    /// Executed second, after bindings are applied
    pub right: Box<Model>,
    /// Relations as configured, with ids normalized to the exposed ids
    #[serde(default)]
    pub join_relations: Vec<JoinRelation>,
    /// Relations that survived application
    #[serde(default)]
    pub bindings: Vec<Binding>,
    /// Renames applied to the left child's exposed parameters
    #[serde(default)]
    pub id_mapping: IdMapping,
    /// (left ∪ right) − binding targets, left first
    #[serde(default)]
    pub merged_parameters: Vec<Parameter>,
    /// Union of both children's packages
    #[serde(default)]
    pub packages: IndexSet<String>,
    /// Declared working directory; resolved at run time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Run configurations over the merged parameters
    #[serde(default)]
    pub simulations: Vec<Simulation>,
    /// Index of the simulation used when this model runs as a child
    #[serde(default)]
    pub selected_simulation: usize,
}

impl CombinedModel {
    /// Original (child-side) id of an exposed left parameter id
    #[must_use]
    pub fn original_left_id<'a>(&'a self, exposed: &'a ParameterId) -> &'a ParameterId {
        self.id_mapping
            .iter()
            .find(|(_, renamed)| *renamed == exposed)
            .map_or(exposed, |(original, _)| original)
    }
}

/// A node of the composition tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Model {
    /// A single script
    Leaf(LeafModel),
    /// Two models joined by relations
    Combined(CombinedModel),
}

impl Model {
    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(leaf) => &leaf.name,
            Self::Combined(combined) => &combined.name,
        }
    }

    /// Parameters this model exposes to a parent
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Self::Leaf(leaf) => &leaf.parameters,
            Self::Combined(combined) => &combined.merged_parameters,
        }
    }

    /// Mutable access to the exposed parameters
    pub fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        match self {
            Self::Leaf(leaf) => &mut leaf.parameters,
            Self::Combined(combined) => &mut combined.merged_parameters,
        }
    }

    /// Packages needed by this model
    #[must_use]
    pub fn packages(&self) -> &IndexSet<String> {
        match self {
            Self::Leaf(leaf) => &leaf.packages,
            Self::Combined(combined) => &combined.packages,
        }
    }

    /// Declared working directory
    #[must_use]
    pub fn working_directory(&self) -> Option<&str> {
        match self {
            Self::Leaf(leaf) => leaf.working_directory.as_deref(),
            Self::Combined(combined) => combined.working_directory.as_deref(),
        }
    }

    /// Replace the declared working directory
    pub fn set_working_directory(&mut self, dir: Option<String>) {
        match self {
            Self::Leaf(leaf) => leaf.working_directory = dir,
            Self::Combined(combined) => combined.working_directory = dir,
        }
    }

    /// Run configurations
    #[must_use]
    pub fn simulations(&self) -> &[Simulation] {
        match self {
            Self::Leaf(leaf) => &leaf.simulations,
            Self::Combined(combined) => &combined.simulations,
        }
    }

    /// Mutable run configurations
    pub fn simulations_mut(&mut self) -> &mut Vec<Simulation> {
        match self {
            Self::Leaf(leaf) => &mut leaf.simulations,
            Self::Combined(combined) => &mut combined.simulations,
        }
    }

    /// Selected simulation index
    #[must_use]
    pub fn selected_simulation(&self) -> usize {
        match self {
            Self::Leaf(leaf) => leaf.selected_simulation,
            Self::Combined(combined) => combined.selected_simulation,
        }
    }

    /// Set the selected simulation index
    pub fn set_selected_simulation(&mut self, index: usize) {
        match self {
            Self::Leaf(leaf) => leaf.selected_simulation = index,
            Self::Combined(combined) => combined.selected_simulation = index,
        }
    }

    /// Language of the first leaf to execute
    #[must_use]
    pub fn language(&self) -> Language {
        self.first_leaf().language
    }

    /// Visualization script that draws the final plot: the last leaf's
    #[must_use]
    pub fn viz_script(&self) -> &str {
        &self.last_leaf().viz_script
    }

    /// Leftmost leaf, the first to execute
    #[must_use]
    pub fn first_leaf(&self) -> &LeafModel {
        match self {
            Self::Leaf(leaf) => leaf,
            Self::Combined(combined) => combined.left.first_leaf(),
        }
    }

    /// Rightmost leaf, the last to execute
    #[must_use]
    pub fn last_leaf(&self) -> &LeafModel {
        match self {
            Self::Leaf(leaf) => leaf,
            Self::Combined(combined) => combined.right.last_leaf(),
        }
    }

    /// Leaves in execution order
    #[must_use]
    pub fn leaves(&self) -> Vec<&LeafModel> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a LeafModel>) {
        match self {
            Self::Leaf(leaf) => out.push(leaf),
            Self::Combined(combined) => {
                combined.left.collect_leaves(out);
                combined.right.collect_leaves(out);
            }
        }
    }

    /// Tree depth; a leaf has depth 1
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Combined(combined) => 1 + combined.left.depth().max(combined.right.depth()),
        }
    }

    /// Whether this is a composite
    #[must_use]
    pub fn is_combined(&self) -> bool {
        matches!(self, Self::Combined(_))
    }
}

impl From<LeafModel> for Model {
    fn from(leaf: LeafModel) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<CombinedModel> for Model {
    fn from(combined: CombinedModel) -> Self {
        Self::Combined(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::DataType;

    fn leaf(name: &str) -> LeafModel {
        LeafModel::new(name, format!("# {}", name))
            .with_parameter(Parameter::input("x", DataType::Double).with_value("1"))
    }

    fn combined(left: Model, right: Model) -> Model {
        Model::Combined(CombinedModel {
            name: format!("{} | {}", left.name(), right.name()),
            left: Box::new(left),
            right: Box::new(right),
            join_relations: Vec::new(),
            bindings: Vec::new(),
            id_mapping: IdMapping::new(),
            merged_parameters: Vec::new(),
            packages: IndexSet::new(),
            working_directory: None,
            simulations: Vec::new(),
            selected_simulation: 0,
        })
    }

    #[test]
    fn test_language_from_label() {
        assert_eq!(Language::from_label("Python 3.7"), Language::Python);
        assert_eq!(Language::from_label("py"), Language::Python);
        assert_eq!(Language::from_label("R 3.4.3"), Language::R);
        assert_eq!(Language::from_label(""), Language::R);
        assert_eq!(Language::Python.file_extension(), "py");
    }

    #[test]
    fn test_leaf_order_and_depth() {
        let tree = combined(
            combined(leaf("a").into(), leaf("b").into()),
            leaf("c").into(),
        );
        let names: Vec<_> = tree.leaves().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.first_leaf().name, "a");
        assert_eq!(tree.last_leaf().name, "c");
    }

    #[test]
    fn test_viz_script_is_last_leaf() {
        let tree = combined(
            leaf("a").with_viz("plot(a)").into(),
            leaf("b").with_viz("plot(b)").into(),
        );
        assert_eq!(tree.viz_script(), "plot(b)");
    }

    #[test]
    fn test_original_left_id() {
        let mut tree = combined(leaf("a").into(), leaf("b").into());
        if let Model::Combined(c) = &mut tree {
            c.id_mapping
                .insert(ParameterId::from("x"), ParameterId::from("x_dup"));
            assert_eq!(c.original_left_id(&ParameterId::from("x_dup")).as_str(), "x");
            assert_eq!(c.original_left_id(&ParameterId::from("y")).as_str(), "y");
        }
    }

    #[test]
    fn test_model_json_tagging() {
        let model: Model = leaf("a").with_package("deSolve").into();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["kind"], "leaf");
        assert_eq!(json["packages"][0], "deSolve");

        let back: Model = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_leaf_document_defaults() {
        let json = r#"{"kind":"leaf","name":"m","script":"y <- x"}"#;
        let model: Model = serde_json::from_str(json).unwrap();
        assert_eq!(model.language(), Language::R);
        assert!(model.parameters().is_empty());
        assert!(model.working_directory().is_none());
        assert_eq!(model.selected_simulation(), 0);
    }
}
