//! Venv layout and executable lookup.

use std::env;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const VENV_BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const VENV_BIN_DIR: &str = "bin";

#[cfg(windows)]
const EXE_SUFFIX: &str = ".exe";
#[cfg(not(windows))]
const EXE_SUFFIX: &str = "";

/// Base python names tried on `PATH`, in order.
pub const BASE_PYTHON_NAMES: [&str; 2] = ["python3", "python"];

/// Directory holding the venv's executables.
pub fn venv_bin_dir(venv_dir: &Path) -> PathBuf {
    venv_dir.join(VENV_BIN_DIR)
}

/// The venv's python executable.
pub fn venv_python(venv_dir: &Path) -> PathBuf {
    venv_executable(venv_dir, "python")
}

/// An executable installed into the venv.
pub fn venv_executable(venv_dir: &Path, name: &str) -> PathBuf {
    venv_bin_dir(venv_dir).join(format!("{}{}", name, EXE_SUFFIX))
}

/// Looks `name` up in a `PATH`-style value.
pub fn find_executable(name: &str, path_var: Option<&str>) -> Option<PathBuf> {
    let path_var = path_var?;
    let file_name = format!("{}{}", name, EXE_SUFFIX);
    env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(&file_name))
        .find(|candidate| is_executable(candidate))
}

/// First base python found on `PATH`.
pub fn find_base_python(path_var: Option<&str>) -> Option<PathBuf> {
    BASE_PYTHON_NAMES
        .iter()
        .find_map(|name| find_executable(name, path_var))
}

/// Whether looking up `program`'s file name on `PATH` finds `program` itself.
pub fn resolves_on_path(program: &Path, path_var: Option<&str>) -> bool {
    let (Some(path_var), Some(file_name)) = (path_var, program.file_name()) else {
        return false;
    };
    env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(file_name))
        .find(|candidate| is_executable(candidate))
        .is_some_and(|found| same_path(&found, program))
}

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Compares paths after resolving symlinks; unresolvable paths compare as given.
pub fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
