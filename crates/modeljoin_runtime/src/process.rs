//! Interpreter backed by a long-lived `Rscript` or `python3` child process.
//!
//! A small driver program runs inside the child. Each script is sent on stdin
//! as a line count followed by that many lines; the driver evaluates the block
//! in one global environment, prints errors to stderr with [`ERROR_PREFIX`],
//! and ends both output streams with [`SENTINEL`]. Closing stdin ends the loop.
//!
//! [`ERROR_PREFIX`]: crate::interpreter::ERROR_PREFIX

use crate::config::InterpreterCommands;
use crate::interpreter::{Interpreter, InterpreterError, ScriptOutput};
use crate::session::InterpreterFactory;
use modeljoin_core::Language;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Marks the end of one block's output on stdout and stderr
pub const SENTINEL: &str = "__MODELJOIN_END__";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const R_DRIVER: &str = r#"
.mj_con <- file("stdin", open = "r")
repeat {
  .mj_header <- readLines(.mj_con, n = 1)
  if (length(.mj_header) == 0) break
  .mj_n <- as.integer(.mj_header)
  .mj_code <- if (.mj_n > 0) readLines(.mj_con, n = .mj_n) else character(0)
  tryCatch(
    eval(parse(text = .mj_code), envir = globalenv()),
    error = function(e) message("Error: ", conditionMessage(e))
  )
  cat("__MODELJOIN_END__\n")
  message("__MODELJOIN_END__")
  flush(stdout())
  flush(stderr())
}
"#;

const PYTHON_DRIVER: &str = r#"
import sys
_mj_globals = {"__name__": "__main__"}
while True:
    _mj_header = sys.stdin.readline()
    if not _mj_header:
        break
    _mj_n = int(_mj_header.strip() or 0)
    _mj_code = "".join(sys.stdin.readline() for _ in range(_mj_n))
    try:
        exec(compile(_mj_code, "<modeljoin>", "exec"), _mj_globals)
    except BaseException as _mj_e:
        sys.stderr.write("Error: %s: %s\n" % (type(_mj_e).__name__, _mj_e))
    sys.stdout.write("__MODELJOIN_END__\n")
    sys.stdout.flush()
    sys.stderr.write("__MODELJOIN_END__\n")
    sys.stderr.flush()
"#;

/// Frame a script for the driver: line count, then the lines
#[must_use]
pub fn frame(script: &str) -> String {
    let lines: Vec<&str> = script.lines().collect();
    let mut framed = format!("{}\n", lines.len());
    for line in lines {
        framed.push_str(line);
        framed.push('\n');
    }
    framed
}

fn spawn_reader<R: Read + Send + 'static>(stream: R) -> (Receiver<String>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    (rx, handle)
}

/// Collect lines up to the sentinel; text before the sentinel on its line is kept
fn read_block(rx: &Receiver<String>) -> Result<Vec<String>, InterpreterError> {
    let mut lines = Vec::new();
    loop {
        let line = rx.recv().map_err(|_| InterpreterError::Closed)?;
        if let Some(rest) = line.strip_suffix(SENTINEL) {
            if !rest.is_empty() {
                lines.push(rest.to_string());
            }
            return Ok(lines);
        }
        lines.push(line);
    }
}

/// Interpreter running in a child process
pub struct ProcessInterpreter {
    language: Language,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Receiver<String>,
    stderr: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessInterpreter {
    /// Start `command` with the driver for `language`
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be spawned
    pub fn spawn(command: &str, language: Language) -> Result<Self, InterpreterError> {
        let mut cmd = Command::new(command);
        match language {
            Language::R => cmd.arg("--vanilla").arg("-e").arg(R_DRIVER),
            Language::Python => cmd.arg("-u").arg("-c").arg(PYTHON_DRIVER),
        };
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| InterpreterError::Spawn {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let spawn_error = |what: &str| InterpreterError::Spawn {
            command: command.to_string(),
            reason: format!("{} not captured", what),
        };
        let stdin = child.stdin.take().ok_or_else(|| spawn_error("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| spawn_error("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| spawn_error("stderr"))?;

        let (stdout, out_handle) = spawn_reader(stdout);
        let (stderr, err_handle) = spawn_reader(stderr);
        debug!(command, pid = child.id(), "Spawned interpreter");

        Ok(Self {
            language,
            child,
            stdin: Some(stdin),
            stdout,
            stderr,
            readers: vec![out_handle, err_handle],
        })
    }

    fn shutdown(&mut self) -> Result<(), InterpreterError> {
        // EOF ends the driver loop
        drop(self.stdin.take());

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let status = loop {
            if let Some(status) = self.child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                break None;
            }
            thread::sleep(Duration::from_millis(20));
        };

        let result = match status {
            Some(status) => {
                debug!(%status, "Interpreter exited");
                Ok(())
            }
            None => {
                warn!(pid = self.child.id(), "Interpreter did not exit, killing");
                self.child.kill()?;
                self.child.wait()?;
                Ok(())
            }
        };
        for handle in self.readers.drain(..) {
            let _ = handle.join();
        }
        result
    }
}

impl Interpreter for ProcessInterpreter {
    fn language(&self) -> Language {
        self.language
    }

    fn execute(&mut self, script: &str) -> Result<ScriptOutput, InterpreterError> {
        let stdin = self.stdin.as_mut().ok_or(InterpreterError::Closed)?;
        stdin.write_all(frame(script).as_bytes())?;
        stdin.flush()?;

        let stdout = read_block(&self.stdout)?;
        let stderr = read_block(&self.stderr)?;
        Ok(ScriptOutput { stdout, stderr })
    }

    fn close(&mut self) -> Result<(), InterpreterError> {
        if self.stdin.is_none() && self.readers.is_empty() {
            return Ok(());
        }
        self.shutdown()
    }
}

impl Drop for ProcessInterpreter {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Opens [`ProcessInterpreter`] sessions using configured executables
#[derive(Debug, Clone, Default)]
pub struct ProcessFactory {
    commands: InterpreterCommands,
}

impl ProcessFactory {
    /// Create a factory
    #[must_use]
    pub fn new(commands: InterpreterCommands) -> Self {
        Self { commands }
    }
}

impl InterpreterFactory for ProcessFactory {
    fn open(&self, language: Language) -> Result<Box<dyn Interpreter>, InterpreterError> {
        let command = self.commands.for_language(language);
        Ok(Box::new(ProcessInterpreter::spawn(command, language)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame() {
        assert_eq!(frame("x <- 1\ny <- 2"), "2\nx <- 1\ny <- 2\n");
        assert_eq!(frame(""), "0\n");
        assert_eq!(frame("a\r\nb\n"), "2\na\nb\n");
    }

    #[test]
    fn test_read_block() {
        let (tx, rx) = mpsc::channel();
        for line in ["one", "two", SENTINEL, "next"] {
            tx.send(line.to_string()).unwrap();
        }
        assert_eq!(read_block(&rx).unwrap(), vec!["one", "two"]);

        tx.send(format!("partial{}", SENTINEL)).unwrap();
        assert_eq!(read_block(&rx).unwrap(), vec!["next", "partial"]);

        drop(tx);
        assert_eq!(read_block(&rx).unwrap_err(), InterpreterError::Closed);
    }

    #[test]
    fn test_spawn_missing_executable() {
        let err = ProcessInterpreter::spawn("modeljoin-no-such-interpreter", Language::R)
            .err()
            .unwrap();
        assert!(matches!(err, InterpreterError::Spawn { .. }));
    }

    #[test]
    fn test_drivers_use_sentinel() {
        assert!(R_DRIVER.contains(SENTINEL));
        assert!(PYTHON_DRIVER.contains(SENTINEL));
        assert!(R_DRIVER.contains("message(\"Error: \""));
    }
}
