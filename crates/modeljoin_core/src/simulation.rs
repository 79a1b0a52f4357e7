//! Simulations: named run configurations.

use crate::id::ParameterId;
use crate::parameter::Parameter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the synthesized default simulation
pub const DEFAULT_SIMULATION: &str = "default";

/// One concrete run configuration: parameter id -> value as script text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Simulation {
    /// Simulation name
    pub name: String,
    /// Parameter assignments, applied in insertion order
    #[serde(default)]
    pub parameters: IndexMap<ParameterId, String>,
}

impl Simulation {
    /// Create an empty simulation
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Build the `"default"` simulation from every parameter that declares a value
    #[must_use]
    pub fn synthesize_default(parameters: &[Parameter]) -> Self {
        let mut simulation = Self::new(DEFAULT_SIMULATION);
        for p in parameters {
            if let Some(value) = &p.value {
                simulation.parameters.insert(p.id.clone(), value.clone());
            }
        }
        simulation
    }

    /// Add an assignment (builder style)
    #[must_use]
    pub fn with(mut self, id: impl Into<ParameterId>, value: impl Into<String>) -> Self {
        self.set(id, value);
        self
    }

    /// Set or replace an assignment
    pub fn set(&mut self, id: impl Into<ParameterId>, value: impl Into<String>) {
        self.parameters.insert(id.into(), value.into());
    }

    /// Look up an assignment
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&str> {
        self.parameters.get(id).map(String::as_str)
    }

    /// Number of assignments
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the simulation assigns nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
