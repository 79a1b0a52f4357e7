//! Scripted interpreter double that records every call.

use crate::interpreter::{Interpreter, InterpreterError, ScriptOutput};
use crate::session::InterpreterFactory;
use indexmap::IndexMap;
use modeljoin_core::Language;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What the double does when a script contains a pattern
#[derive(Debug, Clone)]
pub(crate) enum Reaction {
    /// Report `Error: <message>` on stderr
    Fail(String),
    /// Create a file
    Write(PathBuf, String),
    /// Print a line on stdout
    Print(String),
    /// Cancel the run
    Cancel(CancellationToken),
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub at: Instant,
    pub script: String,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub calls: Vec<Call>,
    pub closes: u32,
}

impl Journal {
    /// Index of the first call containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls.iter().position(|c| c.script.contains(needle))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }

    pub fn script(&self, needle: &str) -> Option<&str> {
        self.calls
            .iter()
            .find(|c| c.script.contains(needle))
            .map(|c| c.script.as_str())
    }
}

pub(crate) struct ScriptedInterpreter {
    language: Language,
    journal: Rc<RefCell<Journal>>,
    reactions: Vec<(String, Reaction)>,
    values: IndexMap<String, String>,
}

impl ScriptedInterpreter {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            journal: Rc::new(RefCell::new(Journal::default())),
            reactions: Vec::new(),
            values: IndexMap::new(),
        }
    }

    pub fn on(mut self, pattern: &str, reaction: Reaction) -> Self {
        self.reactions.push((pattern.to_string(), reaction));
        self
    }

    /// Value returned when `expression` is inspected
    pub fn value(mut self, expression: &str, value: &str) -> Self {
        self.values.insert(expression.to_string(), value.to_string());
        self
    }

    pub fn journal(&self) -> Rc<RefCell<Journal>> {
        Rc::clone(&self.journal)
    }

    fn record(&self, script: &str) {
        self.journal.borrow_mut().calls.push(Call {
            at: Instant::now(),
            script: script.to_string(),
        });
    }
}

impl Interpreter for ScriptedInterpreter {
    fn language(&self) -> Language {
        self.language
    }

    fn execute(&mut self, script: &str) -> Result<ScriptOutput, InterpreterError> {
        self.record(script);
        let mut output = ScriptOutput::default();
        for (pattern, reaction) in &self.reactions {
            if !script.contains(pattern.as_str()) {
                continue;
            }
            match reaction {
                Reaction::Fail(message) => output.stderr.push(format!("Error: {}", message)),
                Reaction::Write(path, contents) => std::fs::write(path, contents)?,
                Reaction::Print(line) => output.stdout.push(line.clone()),
                Reaction::Cancel(token) => token.cancel(),
            }
        }
        Ok(output)
    }

    fn close(&mut self) -> Result<(), InterpreterError> {
        self.journal.borrow_mut().closes += 1;
        Ok(())
    }

    fn inspect(&mut self, expression: &str) -> Result<String, InterpreterError> {
        self.record(&format!("inspect:{}", expression));
        self.values
            .get(expression)
            .cloned()
            .ok_or_else(|| InterpreterError::Evaluation {
                expression: expression.to_string(),
                message: format!("Error: object '{}' not found", expression),
            })
    }
}

/// Hands out one prepared interpreter
pub(crate) struct ScriptedFactory {
    interpreter: RefCell<Option<ScriptedInterpreter>>,
}

impl ScriptedFactory {
    pub fn new(interpreter: ScriptedInterpreter) -> Self {
        Self {
            interpreter: RefCell::new(Some(interpreter)),
        }
    }
}

impl InterpreterFactory for ScriptedFactory {
    fn open(&self, _language: Language) -> Result<Box<dyn Interpreter>, InterpreterError> {
        let interpreter = self
            .interpreter
            .borrow_mut()
            .take()
            .ok_or(InterpreterError::Closed)?;
        Ok(Box::new(interpreter))
    }
}
