//! Strategies applied to a starting node of a [`Graph`].
//!
//! - [`DefaultVisitor`] evaluates the node (parents evaluate implicitly).
//! - [`GraphPrinter`] renders the DAG reachable from the node.
//! - [`ExitCodeReporter`] evaluates the node and logs one status line.

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use tracing::Level;

use crate::error::{FailureStatus, GraphError};
use crate::graph::Graph;
use crate::name::StateName;
use crate::node::StateValue;

/// A strategy applied to a starting node.
pub trait StateVisitor<N: StateName, E> {
    type Output;

    fn visit(&mut self, graph: &Graph<N, E>, start: N) -> Result<Self::Output, E>;
}

/// Evaluates the starting node.
#[derive(Debug, Default)]
pub struct DefaultVisitor;

impl<N: StateName, E: From<GraphError>> StateVisitor<N, E> for DefaultVisitor {
    type Output = StateValue;

    fn visit(&mut self, graph: &Graph<N, E>, start: N) -> Result<StateValue, E> {
        graph.eval(start)
    }
}

/// Renders the DAG reachable from a starting node, one node per line.
///
/// An expanded node is printed as `name [parent, ...]` followed by its
/// parents one level deeper. The parents of a node are expanded only while
/// at least one of them is still unprinted; otherwise each is emitted as
/// `name ...` without recursing. Every node therefore appears expanded at
/// least once and shared ancestry is not repeated indefinitely.
#[derive(Debug)]
pub struct GraphPrinter<N> {
    printed: HashSet<N>,
    indent: &'static str,
    out: String,
}

impl<N: StateName> Default for GraphPrinter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: StateName> GraphPrinter<N> {
    pub fn new() -> Self {
        GraphPrinter {
            printed: HashSet::new(),
            indent: "  ",
            out: String::new(),
        }
    }

    /// Renders the DAG rooted at `start` into a string.
    pub fn render<E: From<GraphError>>(
        mut self,
        graph: &Graph<N, E>,
        start: N,
    ) -> Result<String, GraphError> {
        self.print_node(graph, start, 0, true)?;
        Ok(self.out)
    }

    fn print_node<E: From<GraphError>>(
        &mut self,
        graph: &Graph<N, E>,
        name: N,
        level: usize,
        expand: bool,
    ) -> Result<(), GraphError> {
        let node = graph.lookup(name)?;
        let indent = self.indent.repeat(level);
        if !expand {
            self.line(format_args!("{}{} ...", indent, name.as_str()));
            return Ok(());
        }

        let parents: Vec<N> = node.parents().to_vec();
        let listed: Vec<&str> = parents.iter().map(|p| p.as_str()).collect();
        self.line(format_args!(
            "{}{} [{}]",
            indent,
            name.as_str(),
            listed.join(", ")
        ));
        self.printed.insert(name);

        let expand_parents = parents.iter().any(|p| !self.printed.contains(p));
        for parent in parents {
            self.print_node(graph, parent, level + 1, expand_parents)?;
        }
        Ok(())
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        // Writing into a String cannot fail.
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }
}

impl<N: StateName, E: From<GraphError>> StateVisitor<N, E> for GraphPrinter<N> {
    type Output = String;

    fn visit(&mut self, graph: &Graph<N, E>, start: N) -> Result<String, E> {
        let printer = std::mem::take(self);
        Ok(printer.render(graph, start)?)
    }
}

/// Evaluates the starting node and logs `SUCCESS [0]` or `FAILURE [<code>]`.
///
/// The failure is re-raised after reporting. Test exits propagate without a
/// status line.
#[derive(Debug)]
pub struct ExitCodeReporter {
    level: Level,
    status_line: Option<String>,
}

impl ExitCodeReporter {
    pub fn new(level: Level) -> Self {
        ExitCodeReporter {
            level,
            status_line: None,
        }
    }

    /// The last reported status line, if any.
    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    fn report(&mut self, line: String) {
        match self.level {
            Level::ERROR => tracing::error!("{}", line),
            Level::WARN => tracing::warn!("{}", line),
            Level::INFO => tracing::info!("{}", line),
            Level::DEBUG => tracing::debug!("{}", line),
            Level::TRACE => tracing::trace!("{}", line),
        }
        self.status_line = Some(line);
    }
}

impl<N, E> StateVisitor<N, E> for ExitCodeReporter
where
    N: StateName,
    E: From<GraphError> + FailureStatus + fmt::Display,
{
    type Output = StateValue;

    fn visit(&mut self, graph: &Graph<N, E>, start: N) -> Result<StateValue, E> {
        match graph.eval(start) {
            Ok(value) => {
                self.report(String::from("SUCCESS [0]"));
                Ok(value)
            }
            Err(err) if err.is_test_exit() => Err(err),
            Err(err) => {
                tracing::error!(state = start.as_str(), "{}", err);
                self.report(format!("FAILURE [{}]", err.exit_code()));
                Err(err)
            }
        }
    }
}
