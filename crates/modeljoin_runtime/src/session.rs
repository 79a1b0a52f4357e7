//! Scoped interpreter sessions.

use crate::interpreter::{Interpreter, InterpreterError};
use modeljoin_core::Language;
use tracing::{debug, warn};

/// Opens interpreter sessions
pub trait InterpreterFactory {
    /// Start a session for `language`
    ///
    /// # Errors
    ///
    /// Returns error if the interpreter cannot be started
    fn open(&self, language: Language) -> Result<Box<dyn Interpreter>, InterpreterError>;
}

/// An interpreter that is closed when the session goes out of scope
pub struct InterpreterSession {
    interpreter: Box<dyn Interpreter>,
    closed: bool,
}

impl InterpreterSession {
    /// Acquire a session from `factory`
    ///
    /// # Errors
    ///
    /// Returns error if the interpreter cannot be started
    pub fn open(
        factory: &dyn InterpreterFactory,
        language: Language,
    ) -> Result<Self, InterpreterError> {
        let interpreter = factory.open(language)?;
        debug!(%language, "Opened interpreter session");
        Ok(Self {
            interpreter,
            closed: false,
        })
    }

    /// The session's interpreter
    pub fn interpreter(&mut self) -> &mut dyn Interpreter {
        self.interpreter.as_mut()
    }

    /// Close the session now and report how it went
    ///
    /// # Errors
    ///
    /// Returns error if the interpreter did not shut down cleanly
    pub fn close(mut self) -> Result<(), InterpreterError> {
        self.closed = true;
        self.interpreter.close()
    }
}

impl Drop for InterpreterSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.interpreter.close() {
            warn!(error = %e, "Interpreter did not close cleanly");
        }
    }
}
