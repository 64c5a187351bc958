//! Graph: the registry of state nodes and the entry point for evaluation.
//!
//! [`Graph`] maps each name of a closed enumeration to one node. Nodes are
//! registered once while the graph is built; the only later mutation is
//! replacement of a node by a decorator with the same parent list (used by
//! wizard overlays). Evaluation is depth-first through parent reads, and each
//! read goes through an [`EvalScope`] that rejects undeclared parents.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::error::GraphError;
use crate::name::StateName;
use crate::node::{ParentList, StateNode, StateValue};

/// Registry of state nodes keyed by name.
pub struct Graph<N: StateName, E> {
    nodes: IndexMap<N, Box<dyn StateNode<N, E>>>,
    /// Names currently being evaluated, outermost first.
    eval_stack: RefCell<Vec<N>>,
}

impl<N: StateName, E: From<GraphError>> Default for Graph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: StateName, E: From<GraphError>> Graph<N, E> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Graph {
            nodes: IndexMap::new(),
            eval_stack: RefCell::new(Vec::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Registers `node` under its own name.
    ///
    /// Without `replace_existing` a duplicate name fails with
    /// [`GraphError::AlreadyRegistered`]. With it, the prior node is returned;
    /// the replacement must declare the same parent list.
    pub fn register(
        &mut self,
        node: Box<dyn StateNode<N, E>>,
        replace_existing: bool,
    ) -> Result<Option<Box<dyn StateNode<N, E>>>, GraphError> {
        let name = node.name();
        check_duplicate_parents(name, node.parents())?;

        match self.nodes.get_mut(&name) {
            Some(slot) => {
                if !replace_existing {
                    return Err(GraphError::AlreadyRegistered {
                        name: name.as_str(),
                    });
                }
                if slot.parents() != node.parents() {
                    return Err(GraphError::ParentSetChanged {
                        name: name.as_str(),
                    });
                }
                tracing::debug!(state = name.as_str(), "replacing registered state");
                Ok(Some(std::mem::replace(slot, node)))
            }
            None => {
                self.nodes.insert(name, node);
                Ok(None)
            }
        }
    }

    /// Replaces the node registered under `name` with `wrap(prior)`.
    ///
    /// This is the decorator form of replacement: the wrapper owns the prior
    /// node and typically delegates to it. Slot order is preserved.
    pub fn decorate<F>(&mut self, name: N, wrap: F) -> Result<(), GraphError>
    where
        F: FnOnce(Box<dyn StateNode<N, E>>) -> Box<dyn StateNode<N, E>>,
    {
        let index = self
            .nodes
            .get_index_of(&name)
            .ok_or(GraphError::NotFound {
                name: name.as_str(),
            })?;
        let (_, prior) = self
            .nodes
            .shift_remove_index(index)
            .ok_or(GraphError::NotFound {
                name: name.as_str(),
            })?;
        let parents: ParentList<N> = prior.parents().iter().copied().collect();

        let replacement = wrap(prior);
        if replacement.name() != name || replacement.parents() != parents.as_slice() {
            return Err(GraphError::ParentSetChanged {
                name: name.as_str(),
            });
        }
        self.nodes.shift_insert(index, name, replacement);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Returns the node registered under `name`.
    pub fn lookup(&self, name: N) -> Result<&dyn StateNode<N, E>, GraphError> {
        self.nodes
            .get(&name)
            .map(|node| node.as_ref())
            .ok_or(GraphError::NotFound {
                name: name.as_str(),
            })
    }

    /// True if a node is registered under `name`.
    pub fn contains(&self, name: N) -> bool {
        self.nodes.contains_key(&name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = N> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Evaluates the node registered under `name`.
    pub fn eval(&self, name: N) -> Result<StateValue, E> {
        let node = self.lookup(name)?;
        {
            let mut stack = self.eval_stack.borrow_mut();
            if stack.contains(&name) {
                return Err(GraphError::Cycle {
                    name: name.as_str(),
                }
                .into());
            }
            stack.push(name);
        }

        tracing::trace!(state = name.as_str(), "evaluating state");
        let scope = EvalScope {
            graph: self,
            node: name,
            parents: node.parents(),
        };
        let result = node.evaluate(&scope);
        self.eval_stack.borrow_mut().pop();
        result
    }

    /// Evaluates `name` and downcasts its value to `T`.
    pub fn eval_as<T: 'static>(&self, name: N) -> Result<Rc<T>, E> {
        let value = self.eval(name)?;
        downcast(name, value)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Checks the static graph invariants.
    ///
    /// Every declared parent is registered, parent lists are strictly sorted
    /// by enumeration order (which also rejects duplicates) and the parent
    /// relation is acyclic.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut dag: DiGraphMap<N, ()> = DiGraphMap::new();
        for (name, node) in &self.nodes {
            dag.add_node(*name);
            let mut previous: Option<N> = None;
            for parent in node.parents() {
                if !self.nodes.contains_key(parent) {
                    return Err(GraphError::UnregisteredParent {
                        node: name.as_str(),
                        parent: parent.as_str(),
                    });
                }
                if let Some(prev) = previous {
                    if prev == *parent {
                        return Err(GraphError::DuplicateParent {
                            node: name.as_str(),
                            parent: parent.as_str(),
                        });
                    }
                    if prev.ordinal() > parent.ordinal() {
                        return Err(GraphError::ParentOrder {
                            node: name.as_str(),
                            parent: parent.as_str(),
                        });
                    }
                }
                previous = Some(*parent);
                dag.add_edge(*parent, *name, ());
            }
        }

        toposort(&dag, None).map_err(|cycle| GraphError::Cycle {
            name: cycle.node_id().as_str(),
        })?;
        Ok(())
    }
}

/// A node's view of the graph during its evaluation.
///
/// Only declared parents can be read.
pub struct EvalScope<'g, N: StateName, E> {
    graph: &'g Graph<N, E>,
    node: N,
    parents: &'g [N],
}

impl<'g, N: StateName, E: From<GraphError>> EvalScope<'g, N, E> {
    /// Name of the node being evaluated.
    pub fn node(&self) -> N {
        self.node
    }

    /// Parents declared by the node being evaluated.
    pub fn declared_parents(&self) -> &[N] {
        self.parents
    }

    /// Evaluates a declared parent and returns its untyped value.
    pub fn parent_value(&self, parent: N) -> Result<StateValue, E> {
        if !self.parents.contains(&parent) {
            return Err(GraphError::UndeclaredParent {
                node: self.node.as_str(),
                parent: parent.as_str(),
            }
            .into());
        }
        self.graph.eval(parent)
    }

    /// Evaluates a declared parent and downcasts its value to `T`.
    pub fn parent<T: 'static>(&self, parent: N) -> Result<Rc<T>, E> {
        let value = self.parent_value(parent)?;
        downcast(parent, value)
    }

    /// Like [`EvalScope::parent`] for `Clone` values.
    pub fn parent_cloned<T: Clone + 'static>(&self, parent: N) -> Result<T, E> {
        self.parent::<T>(parent).map(|value| (*value).clone())
    }
}

fn downcast<N: StateName, T: 'static, E: From<GraphError>>(
    name: N,
    value: StateValue,
) -> Result<Rc<T>, E> {
    value.downcast::<T>().map_err(|_| {
        GraphError::ValueType {
            name: name.as_str(),
            expected: std::any::type_name::<T>(),
        }
        .into()
    })
}

fn check_duplicate_parents<N: StateName>(name: N, parents: &[N]) -> Result<(), GraphError> {
    for (i, parent) in parents.iter().enumerate() {
        if parents[..i].contains(parent) {
            return Err(GraphError::DuplicateParent {
                node: name.as_str(),
                parent: parent.as_str(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FnNode;
    use crate::testing::{diamond_graph, TestState};
    use proptest::prelude::*;

    type TestGraph = Graph<TestState, GraphError>;

    fn leaf(name: TestState, parents: &[TestState]) -> Box<dyn StateNode<TestState, GraphError>> {
        FnNode::new(name, parents, move |_| Ok(name.as_str())).cached()
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Root, &[]), false).unwrap();
        let err = graph.register(leaf(TestState::Root, &[]), false).err().unwrap();
        assert!(matches!(err, GraphError::AlreadyRegistered { name: "root" }));
    }

    #[test]
    fn replace_existing_returns_prior() {
        let mut graph = TestGraph::new();
        assert!(graph.register(leaf(TestState::Root, &[]), false).unwrap().is_none());

        let prior = graph
            .register(
                FnNode::new(TestState::Root, &[], |_| Ok("replaced")).cached(),
                true,
            )
            .unwrap()
            .expect("prior node returned");
        assert_eq!(prior.name(), TestState::Root);
        assert_eq!(*graph.eval_as::<&str>(TestState::Root).unwrap(), "replaced");
    }

    #[test]
    fn replacement_must_keep_parents() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Root, &[]), false).unwrap();
        graph.register(leaf(TestState::Left, &[TestState::Root]), false).unwrap();

        let err = graph.register(leaf(TestState::Left, &[]), true).err().unwrap();
        assert!(matches!(err, GraphError::ParentSetChanged { name: "left" }));
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let graph = TestGraph::new();
        assert!(matches!(
            graph.lookup(TestState::Leaf),
            Err(GraphError::NotFound { name: "leaf" })
        ));
        assert!(matches!(
            graph.eval(TestState::Leaf),
            Err(GraphError::NotFound { name: "leaf" })
        ));
    }

    #[test]
    fn duplicate_parent_rejected_at_registration() {
        let mut graph = TestGraph::new();
        let err = graph
            .register(leaf(TestState::Leaf, &[TestState::Root, TestState::Root]), false)
            .err().unwrap();
        assert!(matches!(err, GraphError::DuplicateParent { .. }));
    }

    #[test]
    fn reading_undeclared_parent_fails() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Root, &[]), false).unwrap();
        graph.register(leaf(TestState::Left, &[]), false).unwrap();
        graph
            .register(
                FnNode::new(TestState::Leaf, &[TestState::Left], |scope| {
                    scope.parent::<&str>(TestState::Root).map(|v| *v)
                })
                .cached(),
                false,
            )
            .unwrap();

        let err = graph.eval(TestState::Leaf).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UndeclaredParent {
                node: "leaf",
                parent: "root"
            }
        ));
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Root, &[]), false).unwrap();
        let err = graph.eval_as::<u64>(TestState::Root).unwrap_err();
        assert!(matches!(err, GraphError::ValueType { name: "root", .. }));
    }

    #[test]
    fn diamond_validates_and_evaluates() {
        let graph = diamond_graph();
        graph.validate().unwrap();
        assert_eq!(*graph.eval_as::<String>(TestState::Leaf).unwrap(), "leaf(left(root),right(root))");
    }

    #[test]
    fn validate_rejects_unregistered_parent() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Left, &[TestState::Root]), false).unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::UnregisteredParent {
                node: "left",
                parent: "root"
            })
        ));
    }

    #[test]
    fn validate_rejects_parent_order() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Root, &[]), false).unwrap();
        graph.register(leaf(TestState::Left, &[]), false).unwrap();
        graph
            .register(leaf(TestState::Leaf, &[TestState::Left, TestState::Root]), false)
            .unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::ParentOrder {
                node: "leaf",
                parent: "root"
            })
        ));
    }

    #[test]
    fn validate_rejects_cycle() {
        let mut graph = TestGraph::new();
        graph.register(leaf(TestState::Left, &[TestState::Right]), false).unwrap();
        graph.register(leaf(TestState::Right, &[TestState::Left]), false).unwrap();
        assert!(matches!(graph.validate(), Err(GraphError::Cycle { .. })));
        // Evaluation guards against the same cycle.
        assert!(matches!(
            graph.eval(TestState::Left),
            Err(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn decorate_wraps_prior_node() {
        let mut graph = diamond_graph();
        graph
            .decorate(TestState::Left, |prior| {
                let parents: Vec<TestState> = prior.parents().to_vec();
                FnNode::new(TestState::Left, &parents, move |scope| {
                    let base = prior.evaluate(scope)?;
                    let base = base
                        .downcast::<String>()
                        .map_err(|_| GraphError::NotFound { name: "left" })?;
                    Ok(format!("wizard[{}]", base))
                })
                .cached()
            })
            .unwrap();

        let names: Vec<TestState> = graph.names().collect();
        assert_eq!(names, TestState::all().to_vec());
        assert_eq!(
            *graph.eval_as::<String>(TestState::Leaf).unwrap(),
            "leaf(wizard[left(root)],right(root))"
        );
    }

    fn diamond_parents(name: TestState) -> &'static [TestState] {
        match name {
            TestState::Root => &[],
            TestState::Left | TestState::Right => &[TestState::Root],
            TestState::Leaf => &[TestState::Left, TestState::Right],
        }
    }

    proptest! {
        #[test]
        fn registration_order_does_not_matter(
            order in Just(TestState::all().to_vec()).prop_shuffle()
        ) {
            let mut graph = TestGraph::new();
            for name in &order {
                graph.register(leaf(*name, diamond_parents(*name)), false).unwrap();
            }
            prop_assert!(graph.validate().is_ok());
            prop_assert_eq!(graph.names().collect::<Vec<_>>(), order);
            prop_assert_eq!(*graph.eval_as::<&'static str>(TestState::Leaf).unwrap(), "leaf");
        }

        #[test]
        fn parent_lists_validate_only_when_sorted(
            parents in proptest::sample::subsequence(
                vec![TestState::Root, TestState::Left, TestState::Right],
                0..=3,
            )
            .prop_shuffle()
        ) {
            let mut graph = TestGraph::new();
            for name in [TestState::Root, TestState::Left, TestState::Right] {
                graph.register(leaf(name, &[]), false).unwrap();
            }
            graph.register(leaf(TestState::Leaf, &parents), false).unwrap();
            let sorted = parents.windows(2).all(|pair| pair[0] < pair[1]);
            prop_assert_eq!(graph.validate().is_ok(), sorted);
        }
    }
}
