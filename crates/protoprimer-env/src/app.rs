//! Process entry point: build the context, pick the target, evaluate it.

use std::path::PathBuf;
use std::rc::Rc;

use tracing::Level;

use protoprimer_core::{ExitCodeReporter, FailureStatus, GraphPrinter, StateVisitor};

use crate::args::RunMode;
use crate::context::EnvContext;
use crate::entry_script::{write_entry_script, EntryKind};
use crate::error::BootstrapError;
use crate::runtime::Runtime;
use crate::state::EnvState;

/// Runs one bootstrap and returns the process exit code.
///
/// `graph` mode prints the DAG of the target; every other mode evaluates
/// the target and reports `SUCCESS`/`FAILURE` at `INFO`.
pub fn app_main(rt: Runtime) -> i32 {
    let rt = Rc::new(rt);
    let mut reporter = ExitCodeReporter::new(Level::INFO);
    match run(&rt, &mut reporter) {
        Ok(()) => 0,
        Err(BootstrapError::Args(err)) => {
            // Help and version output land here too.
            let _ = err.print();
            err.exit_code()
        }
        Err(err) if err.is_test_exit() => {
            tracing::debug!("{}", err);
            err.exit_code()
        }
        Err(err) => {
            // The reporter has already logged failures of the target.
            if reporter.status_line().is_none() {
                eprintln!("Error: {}", err);
            }
            err.exit_code()
        }
    }
}

fn run(rt: &Rc<Runtime>, reporter: &mut ExitCodeReporter) -> Result<(), BootstrapError> {
    let context = EnvContext::new(Rc::clone(rt))?;
    context
        .graph()
        .eval(EnvState::InputStderrLogHandlerConfigured)?;
    let target = context.target_state()?;

    if context.run_mode()? == RunMode::Graph {
        let rendered = GraphPrinter::new().render(context.graph(), target)?;
        rt.print(&rendered).map_err(BootstrapError::Output)?;
        return Ok(());
    }

    tracing::debug!(state = ?target, "evaluating target state");
    reporter.visit(context.graph(), target)?;

    if let Some(path) = &context.parsed_args()?.entry_script {
        let graph = context.graph();
        let proto_code = graph.eval_as::<PathBuf>(EnvState::InputProtoCodeFileAbsPathEvalFinalized)?;
        let main_func = graph.eval_as::<Option<String>>(EnvState::InputMainFuncVarLoaded)?;
        let kind = match main_func.as_deref() {
            Some(_) => EntryKind::AppStarter,
            None => EntryKind::EnvBootstrapper,
        };
        write_entry_script(&rt.absolute(path), kind, &proto_code, main_func.as_deref())?;
    }
    Ok(())
}
