//! Bootstrap environment for protoprimer.
//!
//! Wires the state graph from [`protoprimer_core`] with the configuration
//! leaps from [`protoprimer_config`] and the relay from
//! [`protoprimer_relay`]. [`EnvContext`] owns one graph per process;
//! [`app_main`] selects the target state for the run mode and evaluates it.
//!
//! # Modules
//!
//! - [`state`] -- [`EnvState`], the closed enumeration of node names
//! - [`args`] -- command line ([`ParsedArgs`], [`RunMode`], [`WizardStage`])
//! - [`runtime`] -- [`Runtime`]: process inputs and side-effect seams
//! - [`context`] -- [`EnvContext`]: node registration and target selection
//! - [`nodes`] -- node bodies, one module per leap plus the relay strides
//! - [`overlay`] -- wizard decoration of the leap loading nodes
//! - [`logging`] -- stderr and per-invocation file logging
//! - [`entry_script`] -- launcher script generation
//! - [`app`] -- [`app_main`]
//! - [`error`] -- [`BootstrapError`]

pub mod app;
pub mod args;
pub mod context;
pub mod entry_script;
pub mod error;
pub mod logging;
pub mod nodes;
pub mod overlay;
pub mod runtime;
pub mod state;

pub use app::app_main;
pub use args::{ParsedArgs, RunMode, WizardStage};
pub use context::{EnvContext, EnvGraph};
pub use entry_script::{render_entry_script, write_entry_script, EntryKind};
pub use error::BootstrapError;
pub use logging::LogSink;
pub use runtime::Runtime;
pub use state::EnvState;
