//! Relay error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::image::ProcessImage;

/// Errors produced by subprocesses, process replacement and file sync.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A subprocess exited unsuccessfully.
    #[error("command `{command}` failed: {status}")]
    CommandFailed { command: String, status: String },

    /// A subprocess could not be started.
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// `exec` into the next process image failed.
    #[error("failed to replace process with `{program}`: {source}", program = program.display())]
    ExecFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process replacement was intercepted (test mode).
    #[error("process replacement intercepted: {}", image.command_line())]
    ProcessReplaced { image: Box<ProcessImage> },

    /// Filesystem operation failed.
    #[error("I/O error on `{path}`: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required executable is not on `PATH`.
    #[error("no executable `{name}` found on PATH")]
    ExecutableNotFound { name: String },
}

impl RelayError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> RelayError {
        let path = path.into();
        move |source| RelayError::Io { path, source }
    }
}
