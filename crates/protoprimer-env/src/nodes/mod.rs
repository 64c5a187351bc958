//! Node bodies, registered per leap.
//!
//! Each module contributes the nodes of one name section. Bodies capture the
//! shared [`Runtime`](crate::runtime::Runtime) and read parent values through
//! their [`Scope`]; every node is wrapped in a caching node.

use protoprimer_core::{EvalScope, FnNode, GraphError};

use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::state::EnvState;

pub mod client;
pub mod env;
pub mod input;
pub mod output;
pub mod primer;
pub mod stride;

pub(crate) type Scope<'g> = EvalScope<'g, EnvState, BootstrapError>;

/// A node with the bootstrap error type pinned.
pub(crate) fn node<T, F>(
    name: EnvState,
    parents: &[EnvState],
    body: F,
) -> FnNode<EnvState, BootstrapError>
where
    T: 'static,
    F: Fn(&Scope<'_>) -> Result<T, BootstrapError> + 'static,
{
    FnNode::new(name, parents, body)
}

/// Registers `node` behind a cache.
pub(crate) fn add(
    graph: &mut EnvGraph,
    node: FnNode<EnvState, BootstrapError>,
) -> Result<(), GraphError> {
    graph.register(node.cached(), false).map(drop)
}
