//! State graph engine for protoprimer.
//!
//! The bootstrap is modelled as a static DAG of named state nodes. Each node
//! produces one typed value from the values of its declared parents. This
//! crate is generic over the closed name enumeration and the error type so
//! the engine can be tested in isolation from the bootstrap nodes.
//!
//! # Modules
//!
//! - [`name`] -- the [`StateName`] contract for closed name enumerations
//! - [`node`] -- [`StateNode`], [`FnNode`] and the memoizing [`CachingNode`]
//! - [`graph`] -- [`Graph`] registry, evaluation and [`EvalScope`]
//! - [`visitor`] -- evaluation, DAG printing and exit-code reporting
//! - [`error`] -- [`GraphError`] for all engine failure modes

pub mod error;
pub mod graph;
pub mod name;
pub mod node;
pub mod visitor;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{FailureStatus, GraphError};
pub use graph::{EvalScope, Graph};
pub use name::StateName;
pub use node::{CachingNode, FnNode, ParentList, StateNode, StateValue};
pub use visitor::{DefaultVisitor, ExitCodeReporter, GraphPrinter, StateVisitor};
