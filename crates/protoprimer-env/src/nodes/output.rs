//! Effective configuration printing (`config` and `wizard` modes).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use protoprimer_config::{ConfData, ConfLeap, ProjectDescriptor};
use protoprimer_core::GraphError;

use super::env::DriverChoice;
use super::{add, node, Scope};
use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::runtime::Runtime;
use crate::state::EnvState::{self, *};

/// One file-backed leap as loaded.
#[derive(Debug, Clone)]
pub struct LeapSection {
    pub leap: ConfLeap,
    pub path: PathBuf,
    pub data: ConfData,
}

/// Everything `config` mode prints.
#[derive(Debug, Clone, Default)]
pub struct EffectiveConfig {
    pub leaps: Vec<LeapSection>,
    /// Derived values as `(key, value)`, in resolution order.
    pub derived: Vec<(&'static str, String)>,
}

impl EffectiveConfig {
    /// Renders leap files as pretty JSON, then derived values, then keys no
    /// leap recognizes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for section in &self.leaps {
            let object: serde_json::Map<String, Value> = section
                .data
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let _ = writeln!(out, "# {}: {}", section.leap, section.path.display());
            let _ = writeln!(out, "{:#}", Value::Object(object));
        }

        out.push_str("# derived\n");
        for (key, value) in &self.derived {
            let _ = writeln!(out, "{}: {}", key, value);
        }

        let unused: Vec<String> = self
            .leaps
            .iter()
            .flat_map(|section| {
                section
                    .leap
                    .unused_keys(&section.data)
                    .into_iter()
                    .map(move |key| format!("{}: {}", section.leap, key))
            })
            .collect();
        if !unused.is_empty() {
            out.push_str("# unused\n");
            for line in unused {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn path_of(scope: &Scope<'_>, name: EnvState) -> Result<String, BootstrapError> {
    Ok(display(&scope.parent::<PathBuf>(name)?))
}

fn section(
    scope: &Scope<'_>,
    leap: ConfLeap,
    path: EnvState,
    data: EnvState,
) -> Result<LeapSection, BootstrapError> {
    Ok(LeapSection {
        leap,
        path: scope.parent_cloned::<PathBuf>(path)?,
        data: scope.parent_cloned::<ConfData>(data)?,
    })
}

fn collect(scope: &Scope<'_>) -> Result<EffectiveConfig, BootstrapError> {
    let leaps = vec![
        section(
            scope,
            ConfLeap::Primer,
            PrimerConfFileAbsPathEvalFinalized,
            PrimerConfFileDataLoaded,
        )?,
        section(
            scope,
            ConfLeap::Client,
            PrimerConfClientFileAbsPathEvalFinalized,
            ClientConfFileDataLoaded,
        )?,
        section(
            scope,
            ConfLeap::Env,
            EnvConfFileAbsPathEvalFinalized,
            EnvConfFileDataLoaded,
        )?,
    ];

    let descriptors = scope.parent::<Vec<ProjectDescriptor>>(EnvProjectDescriptorsEvalFinalized)?;
    let build_roots: Vec<&str> = descriptors
        .iter()
        .map(|descriptor| descriptor.build_root_dir_rel_path.as_str())
        .collect();
    let driver = scope.parent_cloned::<DriverChoice>(EnvPackageDriverKindEvalFinalized)?;
    let driver = if driver.explicit {
        driver.kind.to_string()
    } else {
        format!("{} (default)", driver.kind)
    };

    let derived = vec![
        ("ref_root_dir_abs_path", path_of(scope, PrimerRefRootDirAbsPathEvalFinalized)?),
        ("client_conf_dir_abs_path", path_of(scope, ClientConfDirAbsPathEvalFinalized)?),
        ("env_conf_dir_abs_path", path_of(scope, EnvConfDirAbsPathEvalFinalized)?),
        (
            "local_python_file_abs_path",
            path_of(scope, EnvLocalPythonFileAbsPathEvalFinalized)?,
        ),
        ("local_venv_dir_abs_path", path_of(scope, EnvLocalVenvDirAbsPathEvalFinalized)?),
        ("local_log_dir_abs_path", path_of(scope, EnvLocalLogDirAbsPathEvalFinalized)?),
        ("local_tmp_dir_abs_path", path_of(scope, EnvLocalTmpDirAbsPathEvalFinalized)?),
        ("local_cache_dir_abs_path", path_of(scope, EnvLocalCacheDirAbsPathEvalFinalized)?),
        (
            "constraints_file_abs_path",
            path_of(scope, EnvConstraintsFileAbsPathEvalFinalized)?,
        ),
        ("project_build_roots", build_roots.join(", ")),
        ("package_driver", driver),
    ];

    Ok(EffectiveConfig { leaps, derived })
}

pub(crate) fn register(graph: &mut EnvGraph, rt: &Rc<Runtime>) -> Result<(), GraphError> {
    let r = Rc::clone(rt);
    add(
        graph,
        node(
            StateEffectiveConfigPrinted,
            &[
                PrimerConfFileAbsPathEvalFinalized,
                PrimerConfFileDataLoaded,
                PrimerRefRootDirAbsPathEvalFinalized,
                PrimerConfClientFileAbsPathEvalFinalized,
                ClientConfDirAbsPathEvalFinalized,
                ClientConfFileDataLoaded,
                EnvConfDirAbsPathEvalFinalized,
                EnvConfFileAbsPathEvalFinalized,
                EnvConfFileDataLoaded,
                EnvLocalPythonFileAbsPathEvalFinalized,
                EnvLocalVenvDirAbsPathEvalFinalized,
                EnvLocalLogDirAbsPathEvalFinalized,
                EnvLocalTmpDirAbsPathEvalFinalized,
                EnvLocalCacheDirAbsPathEvalFinalized,
                EnvConstraintsFileAbsPathEvalFinalized,
                EnvProjectDescriptorsEvalFinalized,
                EnvPackageDriverKindEvalFinalized,
            ],
            move |scope| {
                let rendered = collect(scope)?.render();
                r.print(&rendered).map_err(BootstrapError::Output)?;
                Ok(rendered)
            },
        ),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> ConfData {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => ConfData::new(),
        }
    }

    #[test]
    fn renders_leaps_derived_and_unused() {
        let config = EffectiveConfig {
            leaps: vec![
                LeapSection {
                    leap: ConfLeap::Primer,
                    path: PathBuf::from("/r/proto_kernel.json"),
                    data: data(json!({ "ref_root_dir_rel_path": ".", "colour": "blue" })),
                },
                LeapSection {
                    leap: ConfLeap::Env,
                    path: PathBuf::from("/r/lconf/proto_kernel.json"),
                    data: ConfData::new(),
                },
            ],
            derived: vec![("ref_root_dir_abs_path", String::from("/r"))],
        };
        let text = config.render();
        let expected = "\
# primer: /r/proto_kernel.json
{
  \"ref_root_dir_rel_path\": \".\",
  \"colour\": \"blue\"
}
# env: /r/lconf/proto_kernel.json
{}
# derived
ref_root_dir_abs_path: /r
# unused
primer: colour
";
        assert_eq!(text, expected);
    }

    #[test]
    fn no_unused_section_when_all_keys_known() {
        let config = EffectiveConfig {
            leaps: vec![LeapSection {
                leap: ConfLeap::Primer,
                path: PathBuf::from("/r/p.json"),
                data: data(json!({ "ref_root_dir_rel_path": "." })),
            }],
            derived: Vec::new(),
        };
        assert!(!config.render().contains("# unused"));
    }
}
