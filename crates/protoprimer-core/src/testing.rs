//! Shared fixtures for engine unit tests.

use crate::error::GraphError;
use crate::graph::Graph;
use crate::name::StateName;
use crate::node::FnNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum TestState {
    Root,
    Left,
    Right,
    Leaf,
}

impl StateName for TestState {
    fn as_str(&self) -> &'static str {
        match self {
            TestState::Root => "root",
            TestState::Left => "left",
            TestState::Right => "right",
            TestState::Leaf => "leaf",
        }
    }

    fn ordinal(&self) -> usize {
        *self as usize
    }

    fn all() -> &'static [Self] {
        &[
            TestState::Root,
            TestState::Left,
            TestState::Right,
            TestState::Leaf,
        ]
    }
}

/// root <- left, root <- right, (left, right) <- leaf
pub(crate) fn diamond_graph() -> Graph<TestState, GraphError> {
    let mut graph = Graph::new();
    graph
        .register(
            FnNode::new(TestState::Root, &[], |_| Ok(String::from("root"))).cached(),
            false,
        )
        .unwrap();
    for side in [TestState::Left, TestState::Right] {
        graph
            .register(
                FnNode::new(side, &[TestState::Root], move |scope| {
                    let root = scope.parent::<String>(TestState::Root)?;
                    Ok(format!("{}({})", side.as_str(), root))
                })
                .cached(),
                false,
            )
            .unwrap();
    }
    graph
        .register(
            FnNode::new(
                TestState::Leaf,
                &[TestState::Left, TestState::Right],
                |scope| {
                    let left = scope.parent::<String>(TestState::Left)?;
                    let right = scope.parent::<String>(TestState::Right)?;
                    Ok(format!("leaf({},{})", left, right))
                },
            )
            .cached(),
            false,
        )
        .unwrap();
    graph
}
