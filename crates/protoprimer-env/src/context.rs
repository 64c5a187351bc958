//! Per-process bootstrap context: one graph and its target selection.

use std::rc::Rc;

use protoprimer_core::{Graph, StateName};

use crate::args::{ParsedArgs, RunMode};
use crate::error::BootstrapError;
use crate::nodes;
use crate::overlay::apply_wizard;
use crate::runtime::Runtime;
use crate::state::EnvState;

/// The bootstrap graph.
pub type EnvGraph = Graph<EnvState, BootstrapError>;

/// Owns the graph of one process.
///
/// Built once per process; cached values never cross a process
/// replacement.
pub struct EnvContext {
    rt: Rc<Runtime>,
    graph: EnvGraph,
}

impl EnvContext {
    /// Registers every node and validates the graph. In `wizard` mode the
    /// leap loaders are decorated with the wizard.
    pub fn new(rt: Rc<Runtime>) -> Result<Self, BootstrapError> {
        let mut graph = EnvGraph::new();
        nodes::input::register(&mut graph, &rt)?;
        nodes::primer::register(&mut graph, &rt)?;
        nodes::client::register(&mut graph)?;
        nodes::env::register(&mut graph, &rt)?;
        nodes::stride::register(&mut graph, &rt)?;
        nodes::output::register(&mut graph, &rt)?;
        graph.validate()?;
        tracing::trace!(states = graph.len(), "state graph built");

        let mut context = EnvContext { rt, graph };
        if context.run_mode()? == RunMode::Wizard {
            apply_wizard(&mut context.graph, &context.rt)?;
        }
        Ok(context)
    }

    pub fn graph(&self) -> &EnvGraph {
        &self.graph
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.rt
    }

    pub fn parsed_args(&self) -> Result<Rc<ParsedArgs>, BootstrapError> {
        self.graph.eval_as::<ParsedArgs>(EnvState::InputParsedArgsLoaded)
    }

    pub fn run_mode(&self) -> Result<RunMode, BootstrapError> {
        Ok(*self.graph.eval_as::<RunMode>(EnvState::InputRunModeArgLoaded)?)
    }

    /// `--final-state` when given, otherwise the run mode's target.
    pub fn target_state(&self) -> Result<EnvState, BootstrapError> {
        let args = self.parsed_args()?;
        if let Some(name) = &args.final_state {
            return EnvState::from_name(name)
                .ok_or_else(|| BootstrapError::UnknownFinalState { name: name.clone() });
        }
        Ok(mode_target(self.run_mode()?))
    }
}

/// Target state of each run mode. `graph` renders the `prime` target.
pub fn mode_target(mode: RunMode) -> EnvState {
    match mode {
        RunMode::Prime | RunMode::Upgrade | RunMode::Graph => EnvState::StateProtoCodeUpdated,
        RunMode::Start => EnvState::StateMainFuncExecuted,
        RunMode::Config | RunMode::Wizard => EnvState::StateEffectiveConfigPrinted,
    }
}
