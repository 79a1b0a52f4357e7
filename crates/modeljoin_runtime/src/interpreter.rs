//! Script interpreter interface.
//!
//! An [`Interpreter`] executes script text in one persistent session and
//! returns what the script printed. Everything else the orchestrator needs
//! (working directory, packages, plots, workspaces, reading values back) is
//! expressed as scripts rendered by the session's [`Dialect`], so an
//! implementation only has to provide [`Interpreter::execute`].

use crate::config::PlotSettings;
use crate::dialect::Dialect;
use modeljoin_core::Language;
use std::path::Path;

/// Prefix of a stderr line that reports a fatal script error
pub const ERROR_PREFIX: &str = "Error";

/// Captured output of one script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Lines written to standard output
    pub stdout: Vec<String>,
    /// Lines written to standard error
    pub stderr: Vec<String>,
}

impl ScriptOutput {
    /// First stderr line that marks a fatal error
    #[must_use]
    pub fn fatal_line(&self) -> Option<&str> {
        self.stderr
            .iter()
            .map(String::as_str)
            .find(|line| line.starts_with(ERROR_PREFIX))
    }

    /// Whether the script failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.fatal_line().is_some()
    }
}

/// Interpreter error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpreterError {
    /// Interpreter process could not be started
    #[error("failed to start '{command}': {reason}")]
    Spawn {
        /// Executable
        command: String,
        /// Reason
        reason: String,
    },
    /// Reading or writing the session failed
    #[error("session I/O failed: {reason}")]
    Io {
        /// Reason
        reason: String,
    },
    /// Session ended unexpectedly
    #[error("interpreter session is closed")]
    Closed,
    /// An expression could not be evaluated
    #[error("cannot evaluate '{expression}': {message}")]
    Evaluation {
        /// Expression
        expression: String,
        /// Error line
        message: String,
    },
}

impl From<std::io::Error> for InterpreterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

/// A persistent script session
pub trait Interpreter {
    /// Language of the session
    fn language(&self) -> Language;

    /// Execute script text and capture its output.
    ///
    /// A script error is reported through [`ScriptOutput::fatal_line`], not
    /// as `Err`; `Err` means the session itself is unusable.
    ///
    /// # Errors
    ///
    /// Returns error if the script could not be delivered or its output read
    fn execute(&mut self, script: &str) -> Result<ScriptOutput, InterpreterError>;

    /// End the session and release its resources
    ///
    /// # Errors
    ///
    /// Returns error if the session did not shut down cleanly
    fn close(&mut self) -> Result<(), InterpreterError>;

    /// Snippet renderer for the session's language
    fn dialect(&self) -> Dialect {
        Dialect::new(self.language())
    }

    /// Change the working directory
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable
    fn set_working_directory(&mut self, dir: &Path) -> Result<ScriptOutput, InterpreterError> {
        let script = self.dialect().chdir(dir);
        self.execute(&script)
    }

    /// Install and load packages
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable
    fn install_packages(&mut self, packages: &[String]) -> Result<ScriptOutput, InterpreterError> {
        let script = self.dialect().install_packages(packages);
        self.execute(&script)
    }

    /// Run a visualization script writing a plot to `path`
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable
    fn plot(
        &mut self,
        viz: &str,
        path: &Path,
        settings: &PlotSettings,
    ) -> Result<ScriptOutput, InterpreterError> {
        let script = self.dialect().plot(viz, path, settings);
        self.execute(&script)
    }

    /// Save the session's variables to `path`
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable
    fn save_workspace(&mut self, path: &Path) -> Result<ScriptOutput, InterpreterError> {
        let script = self.dialect().save_workspace(path);
        self.execute(&script)
    }

    /// Evaluate an expression and return its value as a literal
    ///
    /// # Errors
    ///
    /// Returns error if the expression fails or the session is unusable
    fn inspect(&mut self, expression: &str) -> Result<String, InterpreterError> {
        let script = self.dialect().inspect(expression);
        let output = self.execute(&script)?;
        if let Some(line) = output.fatal_line() {
            return Err(InterpreterError::Evaluation {
                expression: expression.to_string(),
                message: line.to_string(),
            });
        }
        Ok(output.stdout.join("\n").trim_end().to_string())
    }
}
