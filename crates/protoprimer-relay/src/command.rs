//! Subprocess invocation.
//!
//! Package drivers describe their work as [`CommandLine`]s and hand them to a
//! [`CommandRunner`], so tests can record commands instead of running them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::RelayError;
use crate::image::shell_word;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl AsRef<Path>) -> Self {
        CommandLine {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        let arg = path.display().to_string();
        self.arg(arg)
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_string()));
        self
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_word(&self.program.display().to_string()))?;
        for arg in &self.args {
            write!(f, " {}", shell_word(arg))?;
        }
        Ok(())
    }
}

/// Runs subprocesses to completion.
pub trait CommandRunner {
    /// Runs with inherited stdio; fails on a non-zero exit.
    fn run(&self, command: &CommandLine) -> Result<(), RelayError>;

    /// Runs and returns captured stdout; stderr is inherited.
    fn capture(&self, command: &CommandLine) -> Result<String, RelayError>;
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, command: &CommandLine) -> Result<(), RelayError> {
        tracing::info!(command = %command, "running");
        let status = command
            .to_command()
            .status()
            .map_err(|source| RelayError::Launch {
                command: command.to_string(),
                source,
            })?;
        if !status.success() {
            return Err(RelayError::CommandFailed {
                command: command.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }

    fn capture(&self, command: &CommandLine) -> Result<String, RelayError> {
        tracing::debug!(command = %command, "capturing");
        let output = command
            .to_command()
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| RelayError::Launch {
                command: command.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(RelayError::CommandFailed {
                command: command.to_string(),
                status: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_words() {
        let line = CommandLine::new("/r/venv/bin/python")
            .args(["-m", "pip", "install"])
            .arg("my app");
        assert_eq!(line.to_string(), "/r/venv/bin/python -m pip install 'my app'");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_failures() {
        let runner = SystemCommandRunner;
        assert!(runner.run(&CommandLine::new("true")).is_ok());
        let err = runner.run(&CommandLine::new("false")).unwrap_err();
        assert!(matches!(err, RelayError::CommandFailed { .. }), "{}", err);
        let err = runner
            .run(&CommandLine::new("/nonexistent/protoprimer-test"))
            .unwrap_err();
        assert!(matches!(err, RelayError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_stdout() {
        let out = SystemCommandRunner
            .capture(&CommandLine::new("echo").arg("pinned==1.0"))
            .unwrap();
        assert_eq!(out, "pinned==1.0\n");
    }
}
