//! MODELJOIN Planner
//!
//! Pure composition of two models into a combined model: id conflict
//! resolution, join relation application, default simulations, validation
//! and the script tree documents used to edit a combined model.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bind;
pub mod compose;
pub mod conflict;
pub mod script_tree;
pub mod settings;
pub mod validate;

pub use bind::{
    apply_relations, normalize_relation, rename_identifiers, Application, DropReason,
    DroppedRelation,
};
pub use compose::{
    synthesize_defaults, Composer, ComposerConfig, CompositionError, CompositionOutput,
    CompositionWarning,
};
pub use conflict::{ConflictError, ConflictResolver, ConflictStrategy, Resolution, DEFAULT_SUFFIX};
pub use script_tree::{ScriptNode, ScriptTreeError};
pub use settings::{parameters_to_json, parse_parameters, JoinSettings};
pub use validate::{ValidationError, Validator};
