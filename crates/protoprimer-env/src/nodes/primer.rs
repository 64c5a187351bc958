//! Primer leap: the JSON file next to the proto-code, locating ref-root.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use protoprimer_config::leap::{conf_file_basename, primer_conf_file_path};
use protoprimer_config::paths::join_clean;
use protoprimer_config::{ConfData, ConfError, ConfField, LeapSpec};
use protoprimer_core::GraphError;

use super::{add, node};
use crate::args::{ParsedArgs, RunMode};
use crate::context::EnvGraph;
use crate::runtime::Runtime;
use crate::state::EnvState::*;

/// Reads a string field needed by a derivation.
pub(crate) fn required_str<'a>(data: &'a ConfData, field: ConfField) -> Result<&'a str, ConfError> {
    field
        .read_str(data)?
        .ok_or(ConfError::FieldMissing { field: field.key() })
}

pub(crate) fn require_dir(path: PathBuf) -> Result<PathBuf, ConfError> {
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ConfError::MissingDir { path })
    }
}

pub(crate) fn register(graph: &mut EnvGraph, rt: &Rc<Runtime>) -> Result<(), GraphError> {
    add(
        graph,
        node(
            PrimerConfFileAbsPathEvalFinalized,
            &[InputProtoCodeFileAbsPathEvalFinalized],
            |scope| {
                let proto_code = scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                Ok(primer_conf_file_path(&proto_code))
            },
        ),
    )?;

    add(
        graph,
        node(
            PrimerConfFileDataLoaded,
            &[
                InputParsedArgsLoaded,
                InputRunModeArgLoaded,
                InputWizardStageArgLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                PrimerConfFileAbsPathEvalFinalized,
            ],
            |scope| {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                let mode = scope.parent_cloned::<RunMode>(InputRunModeArgLoaded)?;
                let proto_code = scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                let path = scope.parent::<PathBuf>(PrimerConfFileAbsPathEvalFinalized)?;
                // The wizard creates the file; `--ref-root` replaces it.
                let required = mode != RunMode::Wizard && args.ref_root.is_none();
                let spec = LeapSpec::primer(&conf_file_basename(&proto_code), required);
                Ok(spec.load(&path)?)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            PrimerRefRootDirAbsPathEvalFinalized,
            &[
                InputParsedArgsLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                PrimerConfFileDataLoaded,
            ],
            move |scope| {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                if let Some(ref_root) = &args.ref_root {
                    return Ok(require_dir(r.absolute(ref_root))?);
                }
                let proto_code = scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                let data = scope.parent::<ConfData>(PrimerConfFileDataLoaded)?;
                let rel = required_str(&data, ConfField::RefRootDirRelPath)?;
                let proto_dir = proto_code.parent().unwrap_or_else(|| Path::new("/"));
                let ref_root = require_dir(join_clean(proto_dir, Path::new(rel)))?;
                tracing::debug!(ref_root = %ref_root.display(), "resolved ref root");
                Ok(ref_root)
            },
        ),
    )?;

    add(
        graph,
        node(
            PrimerConfClientFileAbsPathEvalFinalized,
            &[PrimerConfFileDataLoaded, PrimerRefRootDirAbsPathEvalFinalized],
            |scope| {
                let data = scope.parent::<ConfData>(PrimerConfFileDataLoaded)?;
                let ref_root = scope.parent::<PathBuf>(PrimerRefRootDirAbsPathEvalFinalized)?;
                let rel = required_str(&data, ConfField::ConfClientFileRelPath)?;
                Ok(join_clean(&ref_root, Path::new(rel)))
            },
        ),
    )?;

    Ok(())
}
