//! Execution errors and recoverable warnings.

use crate::interpreter::InterpreterError;
use modeljoin_core::{CoreError, ParameterId};
use modeljoin_plan::ValidationError;
use serde::Serialize;
use std::path::PathBuf;

/// Orchestrator stage of one composite node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Working directory and simulation resolution
    Setup,
    /// Executing the left child
    RecurseLeft,
    /// Copying new left resources to the right
    Propagate,
    /// Evaluating join commands into the right child's simulation
    Bind,
    /// Executing the right child
    RecurseRight,
    /// Merging results
    Aggregate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::RecurseLeft => "recurse-left",
            Self::Propagate => "propagate",
            Self::Bind => "bind",
            Self::RecurseRight => "recurse-right",
            Self::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

/// Fatal execution error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// A script reported an error
    #[error("script of '{model}' failed: {message}")]
    Script {
        /// Model whose script failed
        model: String,
        /// First error line
        message: String,
        /// Everything the script wrote to stderr
        stderr: Vec<String>,
    },
    /// An input or constant parameter has no value
    #[error("parameter '{param}' of '{model}' has no value")]
    MissingParameterValue {
        /// Model name
        model: String,
        /// Parameter id
        param: ParameterId,
    },
    /// Requested simulation does not exist
    #[error("'{model}' has no simulation {index} ({count} defined)")]
    SimulationNotFound {
        /// Model name
        model: String,
        /// Requested index
        index: usize,
        /// Number of simulations
        count: usize,
    },
    /// Host asked to stop
    #[error("cancelled before {stage}")]
    Cancelled {
        /// Stage that did not start
        stage: Stage,
    },
    /// Working directory could not be resolved or created
    #[error("working directory '{path}': {reason}")]
    WorkingDirectory {
        /// Declared or computed path
        path: String,
        /// Reason
        reason: String,
    },
    /// Interpreter could not be used
    #[error("interpreter: {0}")]
    Interpreter(#[from] InterpreterError),
    /// The model tree is inconsistent
    #[error("invalid model: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ValidationError>),
}

impl From<ExecutionError> for CoreError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Cancelled { .. } => CoreError::Cancelled,
            other => CoreError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Recoverable problem recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// Visualization script failed; no plot for this leaf
    Visualization {
        /// Model name
        model: String,
        /// Error line
        message: String,
    },
    /// One resource file was not copied
    ResourceCopy {
        /// File that was skipped
        path: PathBuf,
        /// Reason
        reason: String,
    },
    /// Package installation failed
    PackageInstall {
        /// Model name
        model: String,
        /// Error line
        message: String,
    },
    /// An output parameter could not be read back
    OutputUnavailable {
        /// Model name
        model: String,
        /// Parameter id
        param: ParameterId,
    },
    /// A binding source had no value, the target keeps its own
    UnboundTarget {
        /// Composite name
        model: String,
        /// Binding source
        from: ParameterId,
        /// Binding target
        target: ParameterId,
    },
    /// Workspace could not be saved
    WorkspaceSave {
        /// Model name
        model: String,
        /// Error line
        message: String,
    },
}

impl std::fmt::Display for RunWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Visualization { model, message } => {
                write!(f, "visualization of '{}' failed: {}", model, message)
            }
            Self::ResourceCopy { path, reason } => {
                write!(f, "resource {} not copied: {}", path.display(), reason)
            }
            Self::PackageInstall { model, message } => {
                write!(f, "package installation for '{}' failed: {}", model, message)
            }
            Self::OutputUnavailable { model, param } => {
                write!(f, "output '{}' of '{}' could not be read", param, model)
            }
            Self::UnboundTarget {
                model,
                from,
                target,
            } => write!(
                f,
                "'{}' in '{}' not bound: '{}' has no value",
                target, model, from
            ),
            Self::WorkspaceSave { model, message } => {
                write!(f, "workspace of '{}' not saved: {}", model, message)
            }
        }
    }
}

/// Everything captured during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Captured standard output
    pub stdout: Vec<String>,
    /// Captured standard error
    pub stderr: Vec<String>,
    /// Recoverable problems
    pub warnings: Vec<RunWarning>,
}

/// A fatal error with everything captured before it happened
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    /// What went wrong
    #[source]
    pub error: ExecutionError,
    /// Output and warnings up to the failure
    pub report: RunReport,
}
