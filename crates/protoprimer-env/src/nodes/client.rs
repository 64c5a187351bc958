//! Client leap: the JSON file in the global conf dir under ref-root.

use std::path::{Path, PathBuf};

use protoprimer_config::paths::join_clean;
use protoprimer_config::{ConfData, ConfField, LeapSpec};
use protoprimer_core::GraphError;

use super::primer::required_str;
use super::{add, node, Scope};
use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::state::EnvState::*;

fn ref_root_join(scope: &Scope<'_>, field: ConfField) -> Result<PathBuf, BootstrapError> {
    let ref_root = scope.parent::<PathBuf>(PrimerRefRootDirAbsPathEvalFinalized)?;
    let data = scope.parent::<ConfData>(ClientConfFileDataLoaded)?;
    let rel = required_str(&data, field)?;
    Ok(join_clean(&ref_root, Path::new(rel)))
}

pub(crate) fn register(graph: &mut EnvGraph) -> Result<(), GraphError> {
    add(
        graph,
        node(
            ClientConfDirAbsPathEvalFinalized,
            &[PrimerConfClientFileAbsPathEvalFinalized],
            |scope| {
                let file = scope.parent::<PathBuf>(PrimerConfClientFileAbsPathEvalFinalized)?;
                Ok(file.parent().map(Path::to_path_buf).unwrap_or_default())
            },
        ),
    )?;

    add(
        graph,
        node(
            ClientConfFileDataLoaded,
            &[
                InputWizardStageArgLoaded,
                PrimerConfClientFileAbsPathEvalFinalized,
            ],
            |scope| {
                let path = scope.parent::<PathBuf>(PrimerConfClientFileAbsPathEvalFinalized)?;
                Ok(LeapSpec::client().load(&path)?)
            },
        ),
    )?;

    add(
        graph,
        node(
            ClientLinkNameDirAbsPathEvalFinalized,
            &[PrimerRefRootDirAbsPathEvalFinalized, ClientConfFileDataLoaded],
            |scope| ref_root_join(scope, ConfField::LinkNameDirRelPath),
        ),
    )?;

    add(
        graph,
        node(
            ClientDefaultEnvDirAbsPathEvalFinalized,
            &[PrimerRefRootDirAbsPathEvalFinalized, ClientConfFileDataLoaded],
            |scope| ref_root_join(scope, ConfField::DefaultEnvDirRelPath),
        ),
    )?;

    Ok(())
}
