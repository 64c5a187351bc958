//! Process replacement.
//!
//! [`SystemExecutor`] replaces the running process; it returns only when the
//! replacement fails. [`InterceptExecutor`] stops at the point of
//! replacement instead: it records the image and fails with
//! [`RelayError::ProcessReplaced`], which the entry point treats as a test
//! exit.

use std::cell::RefCell;
use std::convert::Infallible;
use std::process::Command;

use crate::error::RelayError;
use crate::image::ProcessImage;

/// Replaces the current process with a [`ProcessImage`].
pub trait ProcessExecutor {
    /// Never returns `Ok`.
    fn replace(&self, image: ProcessImage) -> Result<Infallible, RelayError>;
}

/// Replaces the process via `execve` (unix) or runs the image as a child and
/// exits with its status (elsewhere).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn command(image: &ProcessImage) -> Command {
        let mut command = Command::new(&image.program);
        command.args(&image.args).env_clear().envs(&image.env);
        command
    }
}

impl ProcessExecutor for SystemExecutor {
    #[cfg(unix)]
    fn replace(&self, image: ProcessImage) -> Result<Infallible, RelayError> {
        use std::os::unix::process::CommandExt;

        tracing::debug!(command = %image.command_line(), "replacing process");
        let source = Self::command(&image).exec();
        Err(RelayError::ExecFailed {
            program: image.program,
            source,
        })
    }

    #[cfg(not(unix))]
    fn replace(&self, image: ProcessImage) -> Result<Infallible, RelayError> {
        tracing::debug!(command = %image.command_line(), "running replacement child");
        let status = Self::command(&image)
            .status()
            .map_err(|source| RelayError::ExecFailed {
                program: image.program.clone(),
                source,
            })?;
        std::process::exit(status.code().unwrap_or(1))
    }
}

/// Records replacement images instead of replacing the process.
#[derive(Debug, Default)]
pub struct InterceptExecutor {
    images: RefCell<Vec<ProcessImage>>,
}

impl InterceptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images seen so far, oldest first.
    pub fn images(&self) -> Vec<ProcessImage> {
        self.images.borrow().clone()
    }

    pub fn last(&self) -> Option<ProcessImage> {
        self.images.borrow().last().cloned()
    }
}

impl ProcessExecutor for InterceptExecutor {
    fn replace(&self, image: ProcessImage) -> Result<Infallible, RelayError> {
        tracing::debug!(command = %image.command_line(), "intercepted process replacement");
        self.images.borrow_mut().push(image.clone());
        Err(RelayError::ProcessReplaced {
            image: Box::new(image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intercept_records_and_fails() {
        let executor = InterceptExecutor::new();
        let image = ProcessImage::new("/r/proto_kernel").arg("start");
        let err = executor.replace(image.clone()).unwrap_err();
        match err {
            RelayError::ProcessReplaced { image: seen } => assert_eq!(*seen, image),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(executor.images(), vec![image.clone()]);
        assert_eq!(executor.last(), Some(image));
    }

    #[cfg(unix)]
    #[test]
    fn system_exec_failure_is_reported() {
        let err = SystemExecutor
            .replace(ProcessImage::new("/nonexistent/protoprimer-test"))
            .unwrap_err();
        assert!(matches!(err, RelayError::ExecFailed { .. }));
    }
}
