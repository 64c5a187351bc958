//! Relay nodes: each advances the process by at most one stride.
//!
//! A node first reads the stride its predecessor reached. When that is
//! already at or past the node's own stride, the node is a no-op. Otherwise
//! it performs its action and either advances in-process or replaces the
//! process with the proto-code, recording the new stride on the image.

use std::convert::Infallible;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use protoprimer_config::ProjectDescriptor;
use protoprimer_core::GraphError;
use protoprimer_relay::proto_code::installed_kernel;
use protoprimer_relay::python::{resolves_on_path, venv_python};
use protoprimer_relay::{
    make_driver, vars, PackageDriver, ProcessImage, ProtoCodeSync, PyExec, PyExecCategory,
};

use super::env::DriverChoice;
use super::{add, node, Scope};
use crate::args::{ParsedArgs, RunMode};
use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::logging::log_file_name;
use crate::runtime::Runtime;
use crate::state::EnvState::*;

/// Runs `sys.argv[1]` (`<module>:<func>`) with the remaining arguments.
const MAIN_FUNC_SNIPPET: &str = "import importlib,sys;\
mod,_,fn=sys.argv[1].partition(':');\
sys.argv=[sys.argv[1]]+sys.argv[2:];\
sys.exit(getattr(importlib.import_module(mod),fn)())";

/// What every re-exec needs: the current invocation and its identity.
///
/// Nodes that build one must declare `InputParsedArgsLoaded`,
/// `InputRunModeArgLoaded`, `InputStartIdVarLoaded` and
/// `InputProtoCodeFileAbsPathEvalFinalized` as parents.
struct Relay {
    rt: Rc<Runtime>,
    args: Rc<ParsedArgs>,
    mode: RunMode,
    start_id: Rc<String>,
    proto_code: Rc<PathBuf>,
}

impl Relay {
    fn from_scope(rt: &Rc<Runtime>, scope: &Scope<'_>) -> Result<Self, BootstrapError> {
        Ok(Relay {
            rt: Rc::clone(rt),
            args: scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?,
            mode: scope.parent_cloned::<RunMode>(InputRunModeArgLoaded)?,
            start_id: scope.parent::<String>(InputStartIdVarLoaded)?,
            proto_code: scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?,
        })
    }

    /// The current invocation, re-targeted at the proto-code.
    fn image(&self) -> ProcessImage {
        ProcessImage::relaunch(&self.proto_code, &self.rt.argv, &self.rt.env)
    }

    /// Replaces the process with `image`, marked as having reached `stride`.
    fn hop(&self, image: ProcessImage, stride: PyExec) -> Result<Infallible, BootstrapError> {
        let mut image = image.with_stride(stride, &self.start_id);
        // Command-line values win over the environment, so keep them in step.
        if self.args.py_exec.is_some() {
            image = image.with_option("--py-exec", stride.as_str());
        }
        if self.args.start_id.is_some() {
            image = image.with_option("--start-id", &self.start_id);
        }
        if self.mode == RunMode::Wizard {
            image = image.with_option("--wizard-stage", "wizard_finished");
        }
        tracing::info!(
            stride = %stride,
            command = %image.command_line(),
            "re-executing proto-code"
        );
        Ok(self.rt.executor.replace(image)?)
    }
}

/// `<venv>.before.<start_id>` next to `venv`.
pub fn venv_backup_dir(venv: &Path, start_id: &str) -> PathBuf {
    let name = venv
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("venv"));
    venv.with_file_name(format!("{}.before.{}", name, start_id))
}

/// Splits `<module>:<func>`; both halves must be non-empty.
pub fn parse_main_func(value: &str) -> Option<(&str, &str)> {
    value
        .split_once(':')
        .filter(|(module, func)| !module.is_empty() && !func.is_empty())
}

pub(crate) fn register(graph: &mut EnvGraph, rt: &Rc<Runtime>) -> Result<(), GraphError> {
    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StateFileLogHandlerConfigured,
            &[
                InputStderrLogHandlerConfigured,
                InputStartIdVarLoaded,
                InputEntryScriptBasenameEvalFinalized,
                EnvLocalLogDirAbsPathEvalFinalized,
            ],
            move |scope| {
                let start_id = scope.parent::<String>(InputStartIdVarLoaded)?;
                let basename = scope.parent::<String>(InputEntryScriptBasenameEvalFinalized)?;
                let log_dir = scope.parent::<PathBuf>(EnvLocalLogDirAbsPathEvalFinalized)?;
                let path = log_dir.join(log_file_name(&basename, &start_id));
                r.log_sink.attach(&path).map_err(BootstrapError::io(&path))?;
                tracing::debug!(log_file = %path.display(), "file logging configured");
                Ok(path)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StatePackageDriverInited,
            &[
                EnvLocalPythonFileAbsPathEvalFinalized,
                EnvLocalCacheDirAbsPathEvalFinalized,
                EnvPackageDriverKindEvalFinalized,
            ],
            move |scope| {
                let python = scope.parent::<PathBuf>(EnvLocalPythonFileAbsPathEvalFinalized)?;
                let cache = scope.parent::<PathBuf>(EnvLocalCacheDirAbsPathEvalFinalized)?;
                let choice = scope.parent_cloned::<DriverChoice>(EnvPackageDriverKindEvalFinalized)?;
                let driver = make_driver(
                    choice.kind,
                    choice.explicit,
                    Rc::clone(&r.runner),
                    &python,
                    &cache,
                    r.var(vars::PATH),
                )?;
                tracing::debug!(driver = %driver.kind(), "package driver ready");
                Ok(driver)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StatePyExecArbitraryReached,
            &[
                InputParsedArgsLoaded,
                InputRunModeArgLoaded,
                InputStartIdVarLoaded,
                InputPyExecVarLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                EnvPyExecCategoryEvalFinalized,
                StateFileLogHandlerConfigured,
            ],
            move |scope| {
                let stride = scope.parent_cloned::<PyExec>(InputPyExecVarLoaded)?;
                if stride >= PyExec::Arbitrary {
                    return Ok(stride);
                }
                let category = scope.parent_cloned::<PyExecCategory>(EnvPyExecCategoryEvalFinalized)?;
                if category == PyExecCategory::ArbitraryVenv {
                    tracing::info!(
                        virtual_env = r.var(vars::VIRTUAL_ENV).unwrap_or_default(),
                        "leaving foreign venv"
                    );
                    let relay = Relay::from_scope(&r, scope)?;
                    match relay.hop(relay.image().strip_venv(), PyExec::Arbitrary)? {}
                }
                Ok(PyExec::Arbitrary)
            },
        ),
    )?;

    add(
        graph,
        node(
            StateReinstallTriggered,
            &[
                InputRunModeArgLoaded,
                InputStartIdVarLoaded,
                EnvLocalVenvDirAbsPathEvalFinalized,
                EnvConstraintsFileAbsPathEvalFinalized,
                StatePyExecArbitraryReached,
            ],
            |scope| {
                let mode = scope.parent_cloned::<RunMode>(InputRunModeArgLoaded)?;
                let stride = scope.parent_cloned::<PyExec>(StatePyExecArbitraryReached)?;
                if mode != RunMode::Upgrade || stride >= PyExec::Required {
                    return Ok(false);
                }
                let start_id = scope.parent::<String>(InputStartIdVarLoaded)?;
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                let constraints = scope.parent::<PathBuf>(EnvConstraintsFileAbsPathEvalFinalized)?;
                if venv.exists() {
                    let backup = venv_backup_dir(&venv, &start_id);
                    fs::rename(venv.as_path(), &backup).map_err(BootstrapError::io(venv.as_path()))?;
                    tracing::info!(backup = %backup.display(), "moved venv aside");
                }
                if constraints.exists() {
                    fs::remove_file(constraints.as_path())
                        .map_err(BootstrapError::io(constraints.as_path()))?;
                    tracing::info!(constraints = %constraints.display(), "removed constraints");
                }
                Ok(true)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StatePyExecRequiredReached,
            &[
                InputParsedArgsLoaded,
                InputRunModeArgLoaded,
                InputStartIdVarLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                EnvLocalPythonFileAbsPathEvalFinalized,
                EnvLocalVenvDirAbsPathEvalFinalized,
                EnvPyExecCategoryEvalFinalized,
                StatePyExecArbitraryReached,
                StateReinstallTriggered,
            ],
            move |scope| {
                let stride = scope.parent_cloned::<PyExec>(StatePyExecArbitraryReached)?;
                if stride >= PyExec::Required {
                    return Ok(stride);
                }
                let python = scope.parent::<PathBuf>(EnvLocalPythonFileAbsPathEvalFinalized)?;
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                let category = scope.parent_cloned::<PyExecCategory>(EnvPyExecCategoryEvalFinalized)?;
                if category == PyExecCategory::RequiredVenv && venv_python(&venv).exists() {
                    tracing::debug!("already inside the required venv");
                    return Ok(PyExec::Venv);
                }
                if category != PyExecCategory::RequiredVenv
                    && resolves_on_path(&python, r.var(vars::PATH))
                {
                    return Ok(PyExec::Required);
                }
                let relay = Relay::from_scope(&r, scope)?;
                let mut image = relay.image().strip_venv();
                if let Some(dir) = python.parent() {
                    image = image.prepend_path(dir);
                }
                match relay.hop(image, PyExec::Required)? {}
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StatePyExecVenvReached,
            &[
                InputParsedArgsLoaded,
                InputRunModeArgLoaded,
                InputStartIdVarLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                EnvLocalPythonFileAbsPathEvalFinalized,
                EnvLocalVenvDirAbsPathEvalFinalized,
                EnvDoInstallEvalFinalized,
                StatePackageDriverInited,
                StatePyExecRequiredReached,
            ],
            move |scope| {
                let stride = scope.parent_cloned::<PyExec>(StatePyExecRequiredReached)?;
                if stride >= PyExec::Venv {
                    return Ok(stride);
                }
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                // Children get the venv through their own images, so a primed
                // venv needs no hop unless the next stride installs into it.
                if venv_python(&venv).exists()
                    && !scope.parent_cloned::<bool>(EnvDoInstallEvalFinalized)?
                {
                    tracing::debug!(venv = %venv.display(), "venv ready, advancing in-process");
                    return Ok(PyExec::Venv);
                }
                let python = scope.parent::<PathBuf>(EnvLocalPythonFileAbsPathEvalFinalized)?;
                let driver = scope.parent::<Box<dyn PackageDriver>>(StatePackageDriverInited)?;
                driver.create_venv(&python, &venv)?;
                let relay = Relay::from_scope(&r, scope)?;
                match relay.hop(relay.image().activate_venv(&venv), PyExec::Venv)? {}
            },
        )
        .without_auto_bootstrap(),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StateDepsUpdated,
            &[
                InputParsedArgsLoaded,
                InputRunModeArgLoaded,
                InputStartIdVarLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                PrimerRefRootDirAbsPathEvalFinalized,
                EnvLocalVenvDirAbsPathEvalFinalized,
                EnvConstraintsFileAbsPathEvalFinalized,
                EnvProjectDescriptorsEvalFinalized,
                EnvDoInstallEvalFinalized,
                StatePackageDriverInited,
                StatePyExecVenvReached,
            ],
            move |scope| {
                let stride = scope.parent_cloned::<PyExec>(StatePyExecVenvReached)?;
                if stride >= PyExec::DepsUpdated {
                    return Ok(stride);
                }
                if !scope.parent_cloned::<bool>(EnvDoInstallEvalFinalized)? {
                    tracing::debug!("dependencies are pinned, skipping install");
                    return Ok(stride);
                }
                let ref_root = scope.parent::<PathBuf>(PrimerRefRootDirAbsPathEvalFinalized)?;
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                let constraints = scope.parent::<PathBuf>(EnvConstraintsFileAbsPathEvalFinalized)?;
                let descriptors =
                    scope.parent::<Vec<ProjectDescriptor>>(EnvProjectDescriptorsEvalFinalized)?;
                let driver = scope.parent::<Box<dyn PackageDriver>>(StatePackageDriverInited)?;
                driver.install_dependencies(&venv, &ref_root, &descriptors, &constraints)?;
                driver.pin_versions(&venv, &constraints)?;
                let relay = Relay::from_scope(&r, scope)?;
                match relay.hop(relay.image().activate_venv(&venv), PyExec::DepsUpdated)? {}
            },
        )
        .without_auto_bootstrap(),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StateProtoCodeUpdated,
            &[
                InputParsedArgsLoaded,
                InputRunModeArgLoaded,
                InputStartIdVarLoaded,
                InputProtoCodeFileAbsPathEvalFinalized,
                EnvLocalVenvDirAbsPathEvalFinalized,
                StateDepsUpdated,
            ],
            move |scope| {
                let stride = scope.parent_cloned::<PyExec>(StateDepsUpdated)?;
                if stride >= PyExec::SrcUpdated {
                    return Ok(stride);
                }
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                let kernel = installed_kernel(&venv);
                if !kernel.exists() {
                    tracing::debug!(kernel = %kernel.display(), "no installed kernel");
                    return Ok(stride);
                }
                let proto_code = scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                if !ProtoCodeSync::new(kernel, proto_code.as_path()).update()? {
                    return Ok(stride);
                }
                let relay = Relay::from_scope(&r, scope)?;
                match relay.hop(relay.image().activate_venv(&venv), PyExec::SrcUpdated)? {}
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StateMainFuncExecuted,
            &[
                InputParsedArgsLoaded,
                InputMainFuncVarLoaded,
                EnvLocalVenvDirAbsPathEvalFinalized,
                StateProtoCodeUpdated,
            ],
            move |scope| -> Result<(), BootstrapError> {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                let main_func = scope.parent::<Option<String>>(InputMainFuncVarLoaded)?;
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                let main_func = match main_func.as_deref() {
                    Some(value) if parse_main_func(value).is_some() => value,
                    other => {
                        return Err(BootstrapError::MainFuncMissing {
                            value: other.unwrap_or_default().to_string(),
                        })
                    }
                };
                let mut image = ProcessImage::new(venv_python(&venv));
                image.env = r.env.clone();
                let image = image
                    .env_remove(vars::PROTOPRIMER_PY_EXEC)
                    .activate_venv(&venv)
                    .args(["-I", "-c", MAIN_FUNC_SNIPPET, main_func])
                    .args(args.user_args.iter().cloned());
                tracing::info!(main_func, "starting application");
                match r.executor.replace(image)? {}
            },
        ),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_func_needs_both_halves() {
        assert_eq!(parse_main_func("app.cli:main"), Some(("app.cli", "main")));
        assert_eq!(parse_main_func("app.cli"), None);
        assert_eq!(parse_main_func(":main"), None);
        assert_eq!(parse_main_func("app:"), None);
    }

    #[test]
    fn backup_sits_next_to_venv() {
        let backup = venv_backup_dir(Path::new("/repo/venv"), "0a1b2c");
        assert_eq!(backup, PathBuf::from("/repo/venv.before.0a1b2c"));
    }

    #[test]
    fn snippet_is_one_line() {
        assert!(!MAIN_FUNC_SNIPPET.contains('\n'));
        assert!(MAIN_FUNC_SNIPPET.starts_with("import importlib,sys;mod,"));
    }
}
