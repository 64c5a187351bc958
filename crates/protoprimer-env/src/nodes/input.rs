//! Input leap: command line, environment variables and working directory.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use protoprimer_config::PackageDriverKind;
use protoprimer_core::GraphError;
use protoprimer_relay::{vars, PyExec};

use super::{add, node};
use crate::args::{ParsedArgs, RunMode};
use crate::context::EnvGraph;
use crate::error::BootstrapError;
use crate::logging::{init_logging, parse_level, resolve_stderr_level};
use crate::runtime::Runtime;
use crate::state::EnvState::*;

/// Hex digits kept from a v4 uuid for a start id.
const START_ID_LEN: usize = 12;

/// Mints a fresh start id.
pub fn new_start_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(START_ID_LEN);
    id
}

fn parse_var<T>(
    rt: &Runtime,
    name: &'static str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, BootstrapError> {
    rt.var(name)
        .map(|raw| {
            parse(raw).map_err(|reason| BootstrapError::InputValue {
                name,
                value: raw.to_string(),
                reason,
            })
        })
        .transpose()
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(String::from("expected `true` or `false`")),
    }
}

pub(crate) fn register(graph: &mut EnvGraph, rt: &Rc<Runtime>) -> Result<(), GraphError> {
    let r = Rc::clone(rt);
    add(
        graph,
        node(InputParsedArgsLoaded, &[], move |_| {
            Ok(ParsedArgs::try_parse_from(&r.argv)?)
        }),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            InputStderrLogLevelEvalFinalized,
            &[InputParsedArgsLoaded],
            move |scope| {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                let baseline = parse_var(&r, vars::PROTOPRIMER_STDERR_LOG_LEVEL, parse_level)?
                    .unwrap_or(LevelFilter::INFO);
                Ok(resolve_stderr_level(
                    baseline,
                    args.verbose,
                    args.quiet,
                    args.silent,
                ))
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            InputStderrLogHandlerConfigured,
            &[InputStderrLogLevelEvalFinalized],
            move |scope| {
                let level = scope.parent_cloned::<LevelFilter>(InputStderrLogLevelEvalFinalized)?;
                let installed = init_logging(level, &r.log_sink);
                tracing::debug!(%level, installed, "stderr logging configured");
                Ok(installed)
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(InputRunModeArgLoaded, &[InputParsedArgsLoaded], move |scope| {
            let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
            if let Some(mode) = args.run_mode {
                return Ok(mode);
            }
            let from_env = parse_var(&r, vars::PROTOPRIMER_RUN_MODE, |raw| {
                RunMode::from_str(raw, true)
            })?;
            Ok(from_env.unwrap_or(RunMode::Prime))
        }),
    )?;

    add(
        graph,
        node(
            InputWizardStageArgLoaded,
            &[InputParsedArgsLoaded],
            |scope| {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                Ok(args.wizard_stage.unwrap_or_default())
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(InputStartIdVarLoaded, &[InputParsedArgsLoaded], move |scope| {
            let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
            let start_id = args
                .start_id
                .clone()
                .or_else(|| r.var(vars::PROTOPRIMER_START_ID).map(str::to_string))
                .unwrap_or_else(new_start_id);
            Ok(start_id)
        }),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(InputPyExecVarLoaded, &[InputParsedArgsLoaded], move |scope| {
            let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
            if let Some(stride) = args.py_exec {
                return Ok(stride);
            }
            let from_env = parse_var(&r, vars::PROTOPRIMER_PY_EXEC, |raw| raw.parse::<PyExec>())?;
            Ok(from_env.unwrap_or_default())
        }),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(InputDoInstallVarLoaded, &[], move |_| {
            parse_var(&r, vars::PROTOPRIMER_DO_INSTALL, parse_bool)
        }),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(InputPackageDriverVarLoaded, &[], move |_| {
            parse_var(&r, vars::PROTOPRIMER_PACKAGE_DRIVER, |raw| {
                raw.parse::<PackageDriverKind>()
            })
        }),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(InputMainFuncVarLoaded, &[], move |_| {
            Ok(r.var(vars::PROTOPRIMER_MAIN_FUNC).map(str::to_string))
        }),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            InputProtoCodeFileAbsPathEvalFinalized,
            &[InputParsedArgsLoaded],
            move |scope| {
                let args = scope.parent::<ParsedArgs>(InputParsedArgsLoaded)?;
                let path = args
                    .proto_code
                    .clone()
                    .or_else(|| r.var(vars::PROTOPRIMER_PROTO_CODE).map(PathBuf::from))
                    .unwrap_or_else(|| r.current_exe.clone());
                Ok(r.absolute(&path))
            },
        ),
    )?;

    let r = Rc::clone(rt);
    add(
        graph,
        node(
            InputEntryScriptBasenameEvalFinalized,
            &[InputProtoCodeFileAbsPathEvalFinalized],
            move |scope| {
                let proto_code =
                    scope.parent::<PathBuf>(InputProtoCodeFileAbsPathEvalFinalized)?;
                Ok(entry_script_basename(
                    r.var(vars::PROTOPRIMER_ENTRY_SCRIPT),
                    r.argv.first().map(String::as_str),
                    &proto_code,
                ))
            },
        ),
    )?;

    Ok(())
}

/// Basename of the script the user ran: the launcher named in the
/// environment, else `argv[0]`, else the proto-code itself.
pub fn entry_script_basename(launcher: Option<&str>, arg0: Option<&str>, proto_code: &Path) -> String {
    launcher
        .into_iter()
        .chain(arg0)
        .find_map(|path| file_name(Path::new(path)))
        .or_else(|| file_name(proto_code))
        .unwrap_or_else(|| String::from("protoprimer"))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_ids_are_short_hex() {
        let id = new_start_id();
        assert_eq!(id.len(), START_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_start_id());
    }

    #[test]
    fn launcher_names_the_entry_script() {
        let proto = Path::new("/r/proto_kernel");
        assert_eq!(
            entry_script_basename(Some("/r/cmd/prime_env"), Some("/r/proto_kernel"), proto),
            "prime_env"
        );
        assert_eq!(entry_script_basename(None, Some("./run_app"), proto), "run_app");
        assert_eq!(entry_script_basename(Some(""), None, proto), "proto_kernel");
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("sometimes").is_err());
    }
}
