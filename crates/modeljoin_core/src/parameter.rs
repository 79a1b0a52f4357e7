//! Model parameters.
//!
//! A parameter is plain data: the composition layer renames and filters
//! parameters, the runtime reads and fills their values.

use crate::id::ParameterId;
use serde::{Deserialize, Serialize};

/// Role of a parameter inside its model script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterClassification {
    /// Value supplied by a simulation before the script runs
    #[serde(alias = "input", alias = "Input")]
    Input,
    /// Value produced by the script
    #[serde(alias = "output", alias = "Output")]
    Output,
    /// Fixed value supplied by a simulation
    #[serde(alias = "constant", alias = "Constant")]
    Constant,
}

impl ParameterClassification {
    /// Whether a value must be supplied before the script runs
    #[must_use]
    pub const fn requires_value(self) -> bool {
        matches!(self, Self::Input | Self::Constant)
    }
}

/// Declared data type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Whole number
    #[serde(alias = "integer")]
    Integer,
    /// Floating point number
    #[serde(alias = "double")]
    Double,
    /// Any numeric value
    #[serde(alias = "number")]
    Number,
    /// Calendar date
    #[serde(alias = "date")]
    Date,
    /// Text
    #[serde(alias = "string")]
    String,
    /// Logical value
    #[serde(alias = "boolean")]
    Boolean,
    /// A path to a resource file
    #[serde(alias = "file")]
    File,
    /// Numeric vector
    #[serde(alias = "vector", alias = "vector_of_numbers")]
    VectorOfNumbers,
    /// Character vector
    #[serde(alias = "vector_of_strings")]
    VectorOfStrings,
    /// Numeric matrix
    #[serde(alias = "matrix", alias = "matrix_of_numbers")]
    MatrixOfNumbers,
    /// Character matrix
    #[serde(alias = "matrix_of_strings")]
    MatrixOfStrings,
    /// Structured value of the script language
    #[serde(alias = "object")]
    Object,
    /// Anything else
    #[serde(alias = "other")]
    Other,
}

/// A declared model parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Identity of the parameter; unique within one executed parameter list
    #[serde(alias = "parameterID")]
    pub id: ParameterId,
    /// Input, output or constant
    #[serde(alias = "parameterClassification")]
    pub classification: ParameterClassification,
    /// Human readable name
    #[serde(alias = "parameterName")]
    pub name: String,
    /// Declared data type
    #[serde(alias = "parameterDataType")]
    pub data_type: DataType,
    /// Literal value as script text
    #[serde(default, alias = "parameterValue", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Lower bound as script text
    #[serde(default, alias = "parameterValueMin", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<String>,
    /// Upper bound as script text
    #[serde(default, alias = "parameterValueMax", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<String>,
    /// Error or uncertainty annotation
    #[serde(default, alias = "parameterError", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Parameter {
    /// Create a parameter whose name equals its id
    #[must_use]
    pub fn new(
        id: impl Into<ParameterId>,
        classification: ParameterClassification,
        data_type: DataType,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.as_str().to_string(),
            id,
            classification,
            data_type,
            value: None,
            min_value: None,
            max_value: None,
            error: None,
        }
    }

    /// Shorthand for an input parameter
    #[must_use]
    pub fn input(id: impl Into<ParameterId>, data_type: DataType) -> Self {
        Self::new(id, ParameterClassification::Input, data_type)
    }

    /// Shorthand for an output parameter
    #[must_use]
    pub fn output(id: impl Into<ParameterId>, data_type: DataType) -> Self {
        Self::new(id, ParameterClassification::Output, data_type)
    }

    /// Shorthand for a constant parameter
    #[must_use]
    pub fn constant(id: impl Into<ParameterId>, data_type: DataType) -> Self {
        Self::new(id, ParameterClassification::Constant, data_type)
    }

    /// Set the literal value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the value range
    #[must_use]
    pub fn with_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    /// Whether this parameter is a file reference
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.data_type == DataType::File
    }
}

/// Find a parameter by id
#[must_use]
pub fn find<'a>(parameters: &'a [Parameter], id: &str) -> Option<&'a Parameter> {
    parameters.iter().find(|p| p.id.as_str() == id)
}

/// Ids that occur more than once, in first-seen order
#[must_use]
pub fn duplicate_ids(parameters: &[Parameter]) -> Vec<ParameterId> {
    let mut seen = indexmap::IndexSet::new();
    let mut duplicates = indexmap::IndexSet::new();
    for p in parameters {
        if !seen.insert(p.id.clone()) {
            duplicates.insert(p.id.clone());
        }
    }
    duplicates.into_iter().collect()
}
