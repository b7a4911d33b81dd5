//! External process failures.

use std::io;
use std::process::{Command, Output};

/// The program could not be started
#[derive(Debug, thiserror::Error)]
#[error("exec {program:?}: {source}")]
pub struct SpawnError {
    pub program: String,
    #[source]
    pub source: io::Error,
}

impl SpawnError {
    pub fn new(program: impl Into<String>, source: io::Error) -> Self {
        Self {
            program: program.into(),
            source,
        }
    }

    /// Builds the error from the command that failed to spawn
    pub fn from_command(command: &Command, source: io::Error) -> Self {
        Self::new(command.get_program().to_string_lossy(), source)
    }
}

/// The program ran but exited unsuccessfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitError {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    /// Raw standard error output
    pub stderr: Vec<u8>,
}

impl ExitError {
    /// Returns an error for a failed run, `None` if the process succeeded
    pub fn from_output(output: &Output) -> Option<Self> {
        if output.status.success() {
            return None;
        }
        Some(Self {
            code: output.status.code(),
            stderr: output.stderr.clone(),
        })
    }
}

impl std::fmt::Display for ExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

impl std::error::Error for ExitError {}

/// No executable with the requested name was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("executable file not found in $PATH")]
pub struct NotFound;

/// Runs the command to completion, turning spawn failures and unsuccessful
/// exits into typed errors.
pub fn output(command: &mut Command) -> Result<Output, ProcessError> {
    let output = command.output().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ProcessError::NotFound(NotFound)
        } else {
            ProcessError::Spawn(SpawnError::from_command(command, e))
        }
    })?;
    match ExitError::from_output(&output) {
        Some(exit) => Err(ProcessError::Exit(exit)),
        None => Ok(output),
    }
}

/// Failure of [`output`]
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    NotFound(NotFound),
    #[error(transparent)]
    Spawn(SpawnError),
    #[error(transparent)]
    Exit(ExitError),
}
