//! Launcher scripts committed next to the proto-code.
//!
//! An entry script fixes the run mode (and, for application starters, the
//! main function), names itself for per-script log files and hands all its
//! arguments to the proto-code.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use protoprimer_relay::vars;

use crate::args::RunMode;
use crate::error::BootstrapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Primes the env: `prime` mode.
    EnvBootstrapper,
    /// Primes the env, then runs the application: `start` mode.
    AppStarter,
}

impl EntryKind {
    pub fn run_mode(&self) -> RunMode {
        match self {
            EntryKind::EnvBootstrapper => RunMode::Prime,
            EntryKind::AppStarter => RunMode::Start,
        }
    }
}

fn sh_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Renders a POSIX `sh` launcher for `proto_code`.
pub fn render_entry_script(kind: EntryKind, proto_code: &Path, main_func: Option<&str>) -> String {
    let mut script = String::from("#!/bin/sh\n");
    let _ = writeln!(
        script,
        "export {}={}",
        vars::PROTOPRIMER_RUN_MODE,
        kind.run_mode().as_str()
    );
    if let Some(main_func) = main_func {
        let _ = writeln!(
            script,
            "export {}={}",
            vars::PROTOPRIMER_MAIN_FUNC,
            sh_quote(main_func)
        );
    }
    let _ = writeln!(script, "export {}=\"$0\"", vars::PROTOPRIMER_ENTRY_SCRIPT);
    let _ = writeln!(
        script,
        "exec {} \"$@\"",
        sh_quote(&proto_code.display().to_string())
    );
    script
}

/// Writes an executable entry script to `path`.
pub fn write_entry_script(
    path: &Path,
    kind: EntryKind,
    proto_code: &Path,
    main_func: Option<&str>,
) -> Result<(), BootstrapError> {
    let script = render_entry_script(kind, proto_code, main_func);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(BootstrapError::io(dir))?;
    }
    fs::write(path, script).map_err(BootstrapError::io(path))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(BootstrapError::io(path))?;
    }
    tracing::info!(path = %path.display(), "wrote entry script");
    Ok(())
}
