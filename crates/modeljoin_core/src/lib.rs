//! MODELJOIN Core Types
//!
//! This crate contains pure types and logic with no I/O: parameters,
//! simulations, join relations and the binary model tree.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod model;
pub mod parameter;
pub mod relation;
pub mod simulation;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use id::{IdMapping, NodeId, ParameterId, RunId};
pub use model::{CombinedModel, Language, LeafModel, Model};
pub use parameter::{DataType, Parameter, ParameterClassification};
pub use relation::{parse_relations, relations_to_json, Binding, JoinRelation};
pub use simulation::{Simulation, DEFAULT_SIMULATION};
