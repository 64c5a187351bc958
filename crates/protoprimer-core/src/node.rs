//! State nodes: the unit of computation in the graph.
//!
//! A [`StateNode`] has a name, an ordered list of declared parents and an
//! `evaluate` body. [`FnNode`] adapts a closure into a node, and
//! [`CachingNode`] memoizes the first successful evaluation of any node.

use std::any::Any;
use std::cell::OnceCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::error::GraphError;
use crate::graph::EvalScope;
use crate::name::StateName;

/// Type-erased node value. Typed access goes through [`EvalScope::parent`]
/// and [`crate::Graph::eval_as`].
pub type StateValue = Rc<dyn Any>;

/// Ordered list of declared parent names.
pub type ParentList<N> = SmallVec<[N; 4]>;

/// One unit of computation in the state graph.
pub trait StateNode<N: StateName, E> {
    /// The stable name this node is registered under.
    fn name(&self) -> N;

    /// Declared parent names, in enumeration order.
    fn parents(&self) -> &[N];

    /// Whether every declared parent is evaluated before the body runs.
    ///
    /// Nodes that conditionally skip some parents opt out. The flag is acted
    /// on by [`CachingNode`], not by [`crate::Graph::eval`]: a node registered
    /// without a cache only evaluates the parents its body reads.
    fn auto_bootstrap_parents(&self) -> bool {
        true
    }

    /// Computes the node value. Parent values are read through `scope`.
    fn evaluate(&self, scope: &EvalScope<'_, N, E>) -> Result<StateValue, E>;
}

type NodeBody<N, E> = Box<dyn Fn(&EvalScope<'_, N, E>) -> Result<StateValue, E>>;

/// A node whose body is a closure.
pub struct FnNode<N: StateName, E> {
    name: N,
    parents: ParentList<N>,
    auto_bootstrap: bool,
    body: NodeBody<N, E>,
}

impl<N: StateName, E: 'static> FnNode<N, E> {
    /// Creates a node producing values of type `T`.
    pub fn new<T, F>(name: N, parents: &[N], body: F) -> Self
    where
        T: 'static,
        F: Fn(&EvalScope<'_, N, E>) -> Result<T, E> + 'static,
    {
        FnNode {
            name,
            parents: parents.iter().copied().collect(),
            auto_bootstrap: true,
            body: Box::new(move |scope| body(scope).map(|value| Rc::new(value) as StateValue)),
        }
    }

    /// Disables evaluation of all parents ahead of the body.
    pub fn without_auto_bootstrap(mut self) -> Self {
        self.auto_bootstrap = false;
        self
    }

    /// Wraps this node into a [`CachingNode`] boxed as a trait object.
    pub fn cached(self) -> Box<dyn StateNode<N, E>>
    where
        E: From<GraphError>,
    {
        Box::new(CachingNode::new(self))
    }
}

impl<N: StateName, E> StateNode<N, E> for FnNode<N, E> {
    fn name(&self) -> N {
        self.name
    }

    fn parents(&self) -> &[N] {
        &self.parents
    }

    fn auto_bootstrap_parents(&self) -> bool {
        self.auto_bootstrap
    }

    fn evaluate(&self, scope: &EvalScope<'_, N, E>) -> Result<StateValue, E> {
        (self.body)(scope)
    }
}

impl<N: StateName, E> StateNode<N, E> for Box<dyn StateNode<N, E>> {
    fn name(&self) -> N {
        (**self).name()
    }

    fn parents(&self) -> &[N] {
        (**self).parents()
    }

    fn auto_bootstrap_parents(&self) -> bool {
        (**self).auto_bootstrap_parents()
    }

    fn evaluate(&self, scope: &EvalScope<'_, N, E>) -> Result<StateValue, E> {
        (**self).evaluate(scope)
    }
}

/// Memoizes the first successful evaluation of the wrapped node.
///
/// The first evaluation also bootstraps the declared parents when the
/// wrapped node asks for it. Later calls return the same `Rc` without touching parents. A failed
/// evaluation is not recorded, so a retry re-enters the body.
pub struct CachingNode<T> {
    inner: T,
    cached: OnceCell<StateValue>,
}

impl<T> CachingNode<T> {
    pub fn new(inner: T) -> Self {
        CachingNode {
            inner,
            cached: OnceCell::new(),
        }
    }

    /// True once a value has been memoized.
    pub fn is_computed(&self) -> bool {
        self.cached.get().is_some()
    }
}

impl<N, E, T> StateNode<N, E> for CachingNode<T>
where
    N: StateName,
    E: From<GraphError>,
    T: StateNode<N, E>,
{
    fn name(&self) -> N {
        self.inner.name()
    }

    fn parents(&self) -> &[N] {
        self.inner.parents()
    }

    fn auto_bootstrap_parents(&self) -> bool {
        self.inner.auto_bootstrap_parents()
    }

    fn evaluate(&self, scope: &EvalScope<'_, N, E>) -> Result<StateValue, E> {
        if let Some(value) = self.cached.get() {
            return Ok(Rc::clone(value));
        }
        if self.inner.auto_bootstrap_parents() {
            for parent in self.inner.parents() {
                scope.parent_value(*parent)?;
            }
        }
        let value = self.inner.evaluate(scope)?;
        // The body may have re-entered through a nested overlay; keep the first value.
        Ok(Rc::clone(self.cached.get_or_init(|| value)))
    }
}
