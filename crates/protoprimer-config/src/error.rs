//! Configuration error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading, validating or editing configuration.
#[derive(Debug, Error)]
pub enum ConfError {
    /// A required leap file does not exist.
    #[error("config `{path}` does not exist - re-run with [wizard]", path = path.display())]
    Missing { path: PathBuf },

    /// The leap file could not be read.
    #[error("failed to read config `{path}`: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The leap file is not a JSON object.
    #[error("malformed config `{path}`: {source}", path = path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The leap file could not be written.
    #[error("failed to write config `{path}`: {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A field needed by a later derivation is absent.
    #[error("Field `{field}` is [None] - re-run with [wizard]")]
    FieldMissing { field: &'static str },

    /// A field holds a value of the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },

    /// A field holds a value outside its accepted set.
    #[error("field `{field}` value `{value}` is invalid: {reason}")]
    FieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// A relative path field is absolute or escapes its base.
    #[error("path `{path}` of field `{field}` {reason}")]
    PathHygiene {
        field: &'static str,
        path: String,
        reason: &'static str,
    },

    /// A directory the configuration points at does not exist.
    #[error("directory `{path}` does not exist", path = path.display())]
    MissingDir { path: PathBuf },

    /// Reading wizard answers or writing prompts failed.
    #[error("wizard prompt failed: {0}")]
    Prompt(#[from] io::Error),

    /// Standard input ended while the wizard was waiting for an answer.
    #[error("wizard input closed while editing [{leap}]")]
    PromptClosed { leap: &'static str },
}
