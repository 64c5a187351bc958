//! Bootstrap error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use protoprimer_config::ConfError;
use protoprimer_core::{FailureStatus, GraphError};
use protoprimer_relay::RelayError;

/// Every failure surfaced by the bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Conf(#[from] ConfError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The command line did not parse (includes `--help`).
    #[error(transparent)]
    Args(#[from] clap::Error),

    /// An environment variable or internal flag holds an unusable value.
    #[error("invalid value `{value}` for `{name}`: {reason}")]
    InputValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The env symlink already selects a different env dir.
    #[error(
        "env symlink `{link}` points at `{current}`, not at the selected `{selected}` - remove the symlink to switch envs",
        link = link.display(),
        current = current.display(),
        selected = selected.display()
    )]
    EnvConflict {
        link: PathBuf,
        current: PathBuf,
        selected: PathBuf,
    },

    /// `start` mode without a usable `<module>:<func>`.
    #[error("`PROTOPRIMER_MAIN_FUNC` must be set to `<module>:<func>` for [start], got `{value}`")]
    MainFuncMissing { value: String },

    /// `--final-state` names no known state.
    #[error("unknown state `{name}`")]
    UnknownFinalState { name: String },

    #[error("I/O error on `{path}`: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing rendered output failed.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl BootstrapError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> BootstrapError {
        let path = path.into();
        move |source| BootstrapError::Io { path, source }
    }
}

impl FailureStatus for BootstrapError {
    fn exit_code(&self) -> i32 {
        match self {
            BootstrapError::Args(err) => err.exit_code(),
            _ => 1,
        }
    }

    fn is_test_exit(&self) -> bool {
        matches!(
            self,
            BootstrapError::Relay(RelayError::ProcessReplaced { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoprimer_relay::ProcessImage;

    #[test]
    fn intercepted_replacement_is_a_test_exit() {
        let err = BootstrapError::from(RelayError::ProcessReplaced {
            image: Box::new(ProcessImage::new("/r/proto_kernel")),
        });
        assert!(err.is_test_exit());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn field_errors_are_not_test_exits() {
        let err = BootstrapError::from(ConfError::FieldMissing {
            field: "ref_root_dir_rel_path",
        });
        assert!(!err.is_test_exit());
        assert_eq!(
            err.to_string(),
            "Field `ref_root_dir_rel_path` is [None] - re-run with [wizard]"
        );
    }
}
