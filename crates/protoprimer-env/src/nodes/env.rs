//! Env leap: the JSON file in the env dir selected by the env symlink, and
//! every local path derived from it.
//!
//! The env leap may override the client leap's local dirs, package driver
//! and project descriptors. Resolution order per field: env value, client
//! value, hard-coded default.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use protoprimer_config::leap::{
    conf_file_basename, CONSTRAINTS_FILE_BASENAME, DEFAULT_CACHE_DIR_REL_PATH,
    DEFAULT_LOG_DIR_REL_PATH, DEFAULT_TMP_DIR_REL_PATH, DEFAULT_VENV_DIR_REL_PATH,
};
use protoprimer_config::paths::{check_rel_path, join_clean, relative_link_target, resolve_any, resolve_override};
use protoprimer_config::{ConfData, ConfError, ConfField, LeapSpec, PackageDriverKind, ProjectDescriptor};
use protoprimer_core::GraphError;
use protoprimer_relay::python::{find_base_python, same_path};
use protoprimer_relay::{vars, PyExecCategory, RelayError};

use super::primer::require_dir;
use super::{add, node, Scope};
use crate::args::{ParsedArgs, RunMode};
use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::runtime::Runtime;
use crate::state::EnvState::*;

/// The package driver to use and whether it was chosen explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverChoice {
    pub kind: PackageDriverKind,
    /// Set by `PROTOPRIMER_PACKAGE_DRIVER` or a leap file; disables the
    /// fallback from `uv` to pip.
    pub explicit: bool,
}

/// Env dir nominated on the command line, if any.
fn selected_env_dir(
    rt: &Runtime,
    args: &ParsedArgs,
    ref_root: &Path,
) -> Result<Option<PathBuf>, BootstrapError> {
    if let Some(dir) = &args.local_env_dir {
        return Ok(Some(rt.absolute(dir)));
    }
    match args.selected_env() {
        Some(rel) => {
            let rel = check_rel_path("--env", rel)?;
            Ok(Some(join_clean(ref_root, rel)))
        }
        None => Ok(None),
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Makes sure `link` selects an env dir and returns it.
///
/// An existing link (or plain directory) is kept as is. A dangling link
/// counts as absent. An absent link is created pointing at `selected`, or
/// at `default_env` when nothing was selected; the target dir is created.
pub fn ensure_env_link(
    link: &Path,
    ref_root: &Path,
    selected: Option<&Path>,
    default_env: &Path,
) -> Result<(), BootstrapError> {
    let conflict = |current: PathBuf, selected: &Path| BootstrapError::EnvConflict {
        link: link.to_path_buf(),
        current,
        selected: selected.to_path_buf(),
    };
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() && link.exists() => {
            if let Some(selected) = selected {
                if !same_path(link, selected) {
                    let current = fs::read_link(link).map_err(BootstrapError::io(link))?;
                    return Err(conflict(current, selected));
                }
            }
            return Ok(());
        }
        Ok(meta) if meta.file_type().is_symlink() => {
            tracing::warn!(link = %link.display(), "env symlink is dangling, recreating");
            fs::remove_file(link).map_err(BootstrapError::io(link))?;
        }
        Ok(_) => {
            if let Some(selected) = selected {
                if !same_path(link, selected) {
                    return Err(conflict(link.to_path_buf(), selected));
                }
            }
            return Ok(());
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(BootstrapError::Io {
                path: link.to_path_buf(),
                source,
            })
        }
    }

    let target = selected.unwrap_or(default_env);
    fs::create_dir_all(target).map_err(BootstrapError::io(target))?;
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(BootstrapError::io(parent))?;
    }
    let link_target = match (link.strip_prefix(ref_root), target.strip_prefix(ref_root)) {
        (Ok(link_rel), Ok(target_rel)) => relative_link_target(link_rel, target_rel),
        _ => target.to_path_buf(),
    };
    create_symlink(&link_target, link).map_err(BootstrapError::io(link))?;
    tracing::info!(
        link = %link.display(),
        target = %link_target.display(),
        "created env symlink"
    );
    Ok(())
}

/// `PATH` without the active venv's directories.
fn base_search_path(rt: &Runtime) -> Option<String> {
    let path = rt.var(vars::PATH)?;
    let Some(venv) = rt.var(vars::VIRTUAL_ENV) else {
        return Some(path.to_string());
    };
    let kept: Vec<PathBuf> = env::split_paths(path)
        .filter(|dir| !dir.starts_with(venv))
        .collect();
    env::join_paths(kept)
        .ok()
        .map(|joined| joined.to_string_lossy().into_owned())
}

/// A local dir: env override, client value, then `default`; all relative
/// to ref-root.
fn local_dir(
    scope: &Scope<'_>,
    field: ConfField,
    default: &str,
) -> Result<PathBuf, BootstrapError> {
    let ref_root = scope.parent::<PathBuf>(PrimerRefRootDirAbsPathEvalFinalized)?;
    let client = scope.parent::<ConfData>(ClientConfFileDataLoaded)?;
    let env = scope.parent::<ConfData>(EnvConfFileDataLoaded)?;
    let rel = match resolve_override(&env, &client, field) {
        Some(value) => value.as_str().ok_or(ConfError::FieldType {
            field: field.key(),
            expected: "a string",
        })?,
        None => default,
    };
    let rel = check_rel_path(field.key(), rel)?;
    Ok(join_clean(&ref_root, rel))
}

/// The leap data holding the effective value of `field`.
fn overriding<'a>(env: &'a ConfData, client: &'a ConfData, field: ConfField) -> &'a ConfData {
    let set_in_env = env.get(field.key()).is_some_and(|value| !value.is_null());
    if set_in_env {
        env
    } else {
        client
    }
}

const LOCAL_DIR_PARENTS: &[crate::state::EnvState] = &[
    PrimerRefRootDirAbsPathEvalFinalized,
    ClientConfFileDataLoaded,
    EnvConfFileDataLoaded,
];

pub(crate) fn register(graph: &mut EnvGraph, rt: &Rc<Runtime>) -> Result<(), GraphError> {
    let r = Rc::clone(rt);
    add(
        graph,
        node(
            EnvLocalConfSymlinkAbsPathEvalFinalized,
            &[
                InputParsedArgsLoaded,
                PrimerRefRootDirAbsPathEvalFinalized,
                ClientLinkNameDirAbsPathEvalFinalized,
                ClientDefaultEnvDirAbsPathEvalFinalized,
            ],
            move |scope| {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                let ref_root = scope.parent::<PathBuf>(PrimerRefRootDirAbsPathEvalFinalized)?;
                let link = scope.parent::<PathBuf>(ClientLinkNameDirAbsPathEvalFinalized)?;
                let default_env = scope.parent::<PathBuf>(ClientDefaultEnvDirAbsPathEvalFinalized)?;
                let selected = selected_env_dir(&r, &args, &ref_root)?;
                ensure_env_link(&link, &ref_root, selected.as_deref(), &default_env)?;
                Ok(link.as_ref().clone())
            },
        ),
    )?;

    add(
        graph,
        node(
            EnvConfDirAbsPathEvalFinalized,
            &[EnvLocalConfSymlinkAbsPathEvalFinalized],
            |scope| {
                let link = scope.parent::<PathBuf>(EnvLocalConfSymlinkAbsPathEvalFinalized)?;
                let resolved = link.canonicalize().unwrap_or_else(|_| link.as_ref().clone());
                Ok(require_dir(resolved)?)
            },
        ),
    )?;

    add(
        graph,
        node(
            EnvConfFileAbsPathEvalFinalized,
            &[
                InputProtoCodeFileAbsPathEvalFinalized,
                EnvLocalConfSymlinkAbsPathEvalFinalized,
            ],
            |scope| {
                let proto_code = scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                let link = scope.parent::<PathBuf>(EnvLocalConfSymlinkAbsPathEvalFinalized)?;
                Ok(link.join(conf_file_basename(&proto_code)))
            },
        ),
    )?;

    add(
        graph,
        node(
            EnvConfFileDataLoaded,
            &[InputWizardStageArgLoaded, EnvConfFileAbsPathEvalFinalized],
            |scope| {
                let path = scope.parent::<PathBuf>(EnvConfFileAbsPathEvalFinalized)?;
                Ok(LeapSpec::env().load(&path)?)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            EnvLocalPythonFileAbsPathEvalFinalized,
            &[PrimerRefRootDirAbsPathEvalFinalized, EnvConfFileDataLoaded],
            move |scope| {
                let ref_root = scope.parent::<PathBuf>(PrimerRefRootDirAbsPathEvalFinalized)?;
                let env = scope.parent::<ConfData>(EnvConfFileDataLoaded)?;
                if let Some(raw) = ConfField::LocalPythonFileAbsPath.read_str(&env)? {
                    return Ok(resolve_any(&ref_root, raw));
                }
                let python = find_base_python(base_search_path(&r).as_deref()).ok_or_else(|| {
                    RelayError::ExecutableNotFound {
                        name: String::from("python3"),
                    }
                })?;
                tracing::debug!(python = %python.display(), "using python from PATH");
                Ok(python)
            },
        ),
    )?;

    for (name, field, default) in [
        (
            EnvLocalVenvDirAbsPathEvalFinalized,
            ConfField::LocalVenvDirRelPath,
            DEFAULT_VENV_DIR_REL_PATH,
        ),
        (
            EnvLocalLogDirAbsPathEvalFinalized,
            ConfField::LocalLogDirRelPath,
            DEFAULT_LOG_DIR_REL_PATH,
        ),
        (
            EnvLocalTmpDirAbsPathEvalFinalized,
            ConfField::LocalTmpDirRelPath,
            DEFAULT_TMP_DIR_REL_PATH,
        ),
        (
            EnvLocalCacheDirAbsPathEvalFinalized,
            ConfField::LocalCacheDirRelPath,
            DEFAULT_CACHE_DIR_REL_PATH,
        ),
    ] {
        add(
            graph,
            node(name, LOCAL_DIR_PARENTS, move |scope| {
                local_dir(scope, field, default)
            }),
        )?;
    }

    add(
        graph,
        node(
            EnvConstraintsFileAbsPathEvalFinalized,
            &[EnvConfDirAbsPathEvalFinalized],
            |scope| {
                let env_dir = scope.parent::<PathBuf>(EnvConfDirAbsPathEvalFinalized)?;
                Ok(env_dir.join(CONSTRAINTS_FILE_BASENAME))
            },
        ),
    )?;

    add(
        graph,
        node(
            EnvProjectDescriptorsEvalFinalized,
            &[ClientConfFileDataLoaded, EnvConfFileDataLoaded],
            |scope| -> Result<Vec<ProjectDescriptor>, BootstrapError> {
                let client = scope.parent::<ConfData>(ClientConfFileDataLoaded)?;
                let env = scope.parent::<ConfData>(EnvConfFileDataLoaded)?;
                let field = ConfField::ProjectDescriptors;
                let source = overriding(&env, &client, field);
                Ok(field.read_descriptors(source)?.unwrap_or_default())
            },
        ),
    )?;

    add(
        graph,
        node(
            EnvPackageDriverKindEvalFinalized,
            &[
                InputPackageDriverVarLoaded,
                ClientConfFileDataLoaded,
                EnvConfFileDataLoaded,
            ],
            |scope| {
                let from_var = scope.parent_cloned::<Option<PackageDriverKind>>(InputPackageDriverVarLoaded)?;
                if let Some(kind) = from_var {
                    return Ok(DriverChoice { kind, explicit: true });
                }
                let client = scope.parent::<ConfData>(ClientConfFileDataLoaded)?;
                let env = scope.parent::<ConfData>(EnvConfFileDataLoaded)?;
                let field = ConfField::PackageDriver;
                let choice = match resolve_override(&env, &client, field) {
                    Some(Value::String(raw)) => DriverChoice {
                        kind: raw.parse().map_err(|reason| ConfError::FieldValue {
                            field: field.key(),
                            value: raw.clone(),
                            reason,
                        })?,
                        explicit: true,
                    },
                    Some(_) => {
                        return Err(ConfError::FieldType {
                            field: field.key(),
                            expected: "a string",
                        }
                        .into())
                    }
                    None => DriverChoice {
                        kind: PackageDriverKind::Uv,
                        explicit: false,
                    },
                };
                Ok(choice)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            EnvPyExecCategoryEvalFinalized,
            &[EnvLocalVenvDirAbsPathEvalFinalized],
            move |scope| {
                let venv = scope.parent::<PathBuf>(EnvLocalVenvDirAbsPathEvalFinalized)?;
                let active = r.var(vars::VIRTUAL_ENV).map(Path::new);
                let category = PyExecCategory::detect(active, &venv);
                tracing::debug!(%category, "interpreter category");
                Ok(category)
            },
        ),
    )?;

    add(
        graph,
        node(
            EnvDoInstallEvalFinalized,
            &[
                InputRunModeArgLoaded,
                InputDoInstallVarLoaded,
                EnvConstraintsFileAbsPathEvalFinalized,
            ],
            |scope| {
                let mode = scope.parent_cloned::<RunMode>(InputRunModeArgLoaded)?;
                let forced = scope.parent_cloned::<Option<bool>>(InputDoInstallVarLoaded)?;
                let constraints = scope.parent::<PathBuf>(EnvConstraintsFileAbsPathEvalFinalized)?;
                Ok(forced.unwrap_or(mode == RunMode::Upgrade || !constraints.exists()))
            },
        ),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn absent_link_is_created_relative() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let link = root.join("lconf");
        let default_env = root.join("default_env");

        ensure_env_link(&link, root, None, &default_env).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("default_env"));
        assert!(default_env.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn nested_link_target_climbs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let link = root.join("conf").join("lconf");
        ensure_env_link(&link, root, None, &root.join("envs").join("a")).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("../envs/a"));
        assert!(link.join(".").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn existing_link_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let link = root.join("lconf");
        fs::create_dir(root.join("special_env")).unwrap();
        std::os::unix::fs::symlink("special_env", &link).unwrap();

        ensure_env_link(&link, root, None, &root.join("default_env")).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("special_env"));
        assert!(!root.join("default_env").exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let link = root.join("lconf");
        std::os::unix::fs::symlink("gone_env", &link).unwrap();

        ensure_env_link(&link, root, None, &root.join("default_env")).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("default_env"));
    }

    #[cfg(unix)]
    #[test]
    fn conflicting_selection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let link = root.join("lconf");
        fs::create_dir(root.join("default_env")).unwrap();
        fs::create_dir(root.join("special_env")).unwrap();
        std::os::unix::fs::symlink("default_env", &link).unwrap();

        let err = ensure_env_link(
            &link,
            root,
            Some(&root.join("special_env")),
            &root.join("default_env"),
        )
        .unwrap_err();
        assert!(matches!(err, BootstrapError::EnvConflict { .. }), "{}", err);

        // Selecting what is already linked is fine.
        ensure_env_link(
            &link,
            root,
            Some(&root.join("default_env")),
            &root.join("default_env"),
        )
        .unwrap();
    }

    #[test]
    fn env_overrides_client_for_descriptors() {
        let env: ConfData = serde_json::from_value(serde_json::json!({
            "project_descriptors": null,
        }))
        .unwrap();
        let client: ConfData = serde_json::from_value(serde_json::json!({
            "project_descriptors": [{ "build_root_dir_rel_path": "app" }],
        }))
        .unwrap();
        let source = overriding(&env, &client, ConfField::ProjectDescriptors);
        assert!(std::ptr::eq(source, &client));
    }
}
