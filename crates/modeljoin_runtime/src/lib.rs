//! MODELJOIN Runtime
//!
//! Executes model trees against persistent R or Python sessions:
//! working directory resolution, resource propagation between children,
//! join value binding and the staged orchestrator.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dialect;
pub mod error;
pub mod interpreter;
pub mod monitor;
pub mod orchestrator;
pub mod process;
pub mod propagate;
pub mod session;
pub mod workdir;

#[cfg(test)]
mod testing;

pub use config::{InterpreterCommands, PlotSettings, RunnerConfig};
pub use dialect::Dialect;
pub use error::{ExecutionError, ExecutionFailure, RunReport, RunWarning, Stage};
pub use interpreter::{Interpreter, InterpreterError, ScriptOutput};
pub use monitor::{Metrics, RunMonitor, StageEvent};
pub use orchestrator::{ExecutionOutcome, Orchestrator, Values};
pub use process::{ProcessFactory, ProcessInterpreter};
pub use propagate::{Propagation, ResourcePropagator, ResourceSnapshot};
pub use session::{InterpreterFactory, InterpreterSession};
pub use workdir::{resolve_layout, Layout};
