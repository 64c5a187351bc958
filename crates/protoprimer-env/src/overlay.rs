//! Wizard overlay for the leap loading nodes.
//!
//! In `wizard` mode each `*_conf_file_data_loaded` node is decorated: the
//! leap file is read without validation, edited interactively and written
//! back before any child sees it, so invalid stored values are prompted for
//! instead of failing the load. Once the wizard stage is `wizard_finished`
//! the original loader runs unchanged. Parent lists are unchanged; the
//! loaders already declare the wizard stage and their file path.

use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;

use protoprimer_config::leap::conf_file_basename;
use protoprimer_config::{write_conf, ConfData, ConfField, ConfLeap, LeapSpec, LeapWizard};
use protoprimer_core::{CachingNode, GraphError, StateNode, StateValue};

use crate::args::WizardStage;
use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::nodes::Scope;
use crate::runtime::Runtime;
use crate::state::EnvState::{self, *};

type BoxedNode = Box<dyn StateNode<EnvState, BootstrapError>>;

/// Leap loaders the wizard decorates, with the node giving each file path.
const WIZARD_LEAPS: [(ConfLeap, EnvState, EnvState); 3] = [
    (
        ConfLeap::Primer,
        PrimerConfFileDataLoaded,
        PrimerConfFileAbsPathEvalFinalized,
    ),
    (
        ConfLeap::Client,
        ClientConfFileDataLoaded,
        PrimerConfClientFileAbsPathEvalFinalized,
    ),
    (ConfLeap::Env, EnvConfFileDataLoaded, EnvConfFileAbsPathEvalFinalized),
];

struct WizardNode {
    inner: BoxedNode,
    leap: ConfLeap,
    path_state: EnvState,
    rt: Rc<Runtime>,
}

impl WizardNode {
    fn proposals(&self) -> ConfData {
        let mut proposals = ConfData::new();
        if self.leap == ConfLeap::Primer {
            proposals.insert(
                ConfField::RefRootDirRelPath.key().to_string(),
                Value::String(String::from(".")),
            );
        }
        proposals
    }

    /// The loader's spec, without the requirement that the file exists.
    fn spec(&self, scope: &Scope<'_>) -> Result<LeapSpec, BootstrapError> {
        Ok(match self.leap {
            ConfLeap::Primer => {
                let proto_code = scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                LeapSpec::primer(&conf_file_basename(&proto_code), false)
            }
            ConfLeap::Client => LeapSpec::client(),
            _ => LeapSpec::env(),
        })
    }
}

impl StateNode<EnvState, BootstrapError> for WizardNode {
    fn name(&self) -> EnvState {
        self.inner.name()
    }

    fn parents(&self) -> &[EnvState] {
        self.inner.parents()
    }

    fn auto_bootstrap_parents(&self) -> bool {
        self.inner.auto_bootstrap_parents()
    }

    fn evaluate(&self, scope: &Scope<'_>) -> Result<StateValue, BootstrapError> {
        let stage = scope.parent_cloned::<WizardStage>(InputWizardStageArgLoaded)?;
        if stage == WizardStage::WizardFinished {
            return self.inner.evaluate(scope);
        }
        let path = scope.parent::<PathBuf>(self.path_state)?;
        let data = self.spec(scope)?.load_unvalidated(&path)?;

        let accepted = {
            let mut input = self.rt.input.borrow_mut();
            let mut output = self.rt.output.borrow_mut();
            LeapWizard::new(self.leap, &path)
                .with_proposals(self.proposals())
                .run(data, &mut **input, &mut **output)?
        };
        write_conf(&path, &accepted)?;
        tracing::info!(leap = %self.leap, path = %path.display(), "saved leap file");
        Ok(Rc::new(accepted) as StateValue)
    }
}

/// Decorates the leap loaders of `graph` with the wizard.
pub fn apply_wizard(graph: &mut EnvGraph, rt: &Rc<Runtime>) -> Result<(), GraphError> {
    for (leap, loader, path_state) in WIZARD_LEAPS {
        let rt = Rc::clone(rt);
        graph.decorate(loader, move |inner| {
            Box::new(CachingNode::new(WizardNode {
                inner,
                leap,
                path_state,
                rt,
            }))
        })?;
    }
    Ok(())
}
