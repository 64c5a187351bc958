//! Engine error types.
//!
//! [`GraphError`] covers registration, validation and evaluation failures of
//! the state graph. Names are carried as `&'static str` so the error stays
//! independent of the concrete name enumeration.

use thiserror::Error;

/// Errors produced by the state graph engine.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node with this name is already registered and replacement was not requested.
    #[error("state `{name}` is already registered")]
    AlreadyRegistered { name: &'static str },

    /// No node is registered under this name.
    #[error("state `{name}` is not found")]
    NotFound { name: &'static str },

    /// A node read a parent it did not declare.
    #[error("state `{node}` reads undeclared parent `{parent}`")]
    UndeclaredParent {
        node: &'static str,
        parent: &'static str,
    },

    /// A declared parent has no registered node.
    #[error("state `{node}` declares unregistered parent `{parent}`")]
    UnregisteredParent {
        node: &'static str,
        parent: &'static str,
    },

    /// The same parent appears twice in one parent list.
    #[error("state `{node}` declares parent `{parent}` more than once")]
    DuplicateParent {
        node: &'static str,
        parent: &'static str,
    },

    /// Parent list is not sorted by enumeration order.
    #[error("state `{node}` declares parent `{parent}` out of enumeration order")]
    ParentOrder {
        node: &'static str,
        parent: &'static str,
    },

    /// The parent relation is not acyclic.
    #[error("cycle detected through state `{name}`")]
    Cycle { name: &'static str },

    /// A replacement node declared a different parent list than the node it replaced.
    #[error("replacement for state `{name}` changes its declared parents")]
    ParentSetChanged { name: &'static str },

    /// A node value could not be downcast to the requested type.
    #[error("state `{name}` produced a value of unexpected type, expected `{expected}`")]
    ValueType {
        name: &'static str,
        expected: &'static str,
    },
}

/// How an evaluation failure maps onto a process exit status.
pub trait FailureStatus {
    /// Exit code reported for this failure.
    fn exit_code(&self) -> i32 {
        1
    }

    /// True when the failure is the deliberate interception of a process
    /// replacement by a test harness. Such failures exit non-zero without a
    /// `FAILURE` status line.
    fn is_test_exit(&self) -> bool {
        false
    }
}

impl FailureStatus for GraphError {}
