//! Layered configuration for protoprimer.
//!
//! Configuration is resolved in four ordered leaps: `input` (process
//! environment and command line), `primer` (JSON next to the proto-code),
//! `client` (JSON in the global conf dir under ref-root) and `env` (JSON in
//! the selected env dir, reached through a symlink). Each file-backed leap is
//! loaded, merged with its defaults, validated and optionally run through the
//! interactive wizard.
//!
//! # Modules
//!
//! - [`leap`] -- [`ConfLeap`], [`LeapSpec`] and the file naming conventions
//! - [`field`] -- [`ConfField`] metadata: keys, descriptions, validation
//! - [`data`] -- [`ConfData`] documents and atomic JSON persistence
//! - [`paths`] -- relative-path hygiene and path derivation helpers
//! - [`descriptor`] -- [`ProjectDescriptor`] and [`PackageDriverKind`]
//! - [`wizard`] -- the interactive per-leap field editor
//! - [`error`] -- [`ConfError`]

pub mod data;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod leap;
pub mod paths;
pub mod wizard;

pub use data::{read_conf, write_conf, ConfData};
pub use descriptor::{PackageDriverKind, ProjectDescriptor};
pub use error::ConfError;
pub use field::ConfField;
pub use leap::{ConfLeap, LeapSpec};
pub use wizard::{LeapWizard, WizardProgress};
