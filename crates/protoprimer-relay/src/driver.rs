//! Package driver strategies.
//!
//! A [`PackageDriver`] creates the venv, installs the configured projects in
//! editable mode and pins what got installed into the constraints file. The
//! two implementations differ only in the commands they issue:
//!
//! | operation        | pip                                          | uv                                        |
//! |------------------|----------------------------------------------|-------------------------------------------|
//! | create venv      | `python -m venv DIR` + upgrade pip           | `uv venv --python python DIR`             |
//! | install          | `venv/python -m pip install ...`             | `uv pip install --python venv/python ...` |
//! | pin              | `venv/python -m pip freeze --exclude-editable` | `uv pip freeze --python venv/python --exclude-editable` |

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use protoprimer_config::{PackageDriverKind, ProjectDescriptor};

use crate::command::{CommandLine, CommandRunner};
use crate::error::RelayError;
use crate::python::{find_executable, venv_executable, venv_python};

/// Venv-management strategy.
pub trait PackageDriver {
    fn kind(&self) -> PackageDriverKind;

    /// Creates `venv_dir` from `base_python`. Skipped when the venv python
    /// already exists.
    fn create_venv(&self, base_python: &Path, venv_dir: &Path) -> Result<(), RelayError>;

    /// Installs every descriptor in editable mode with one invocation,
    /// honoring `constraints` when the file exists.
    fn install_dependencies(
        &self,
        venv_dir: &Path,
        ref_root: &Path,
        descriptors: &[ProjectDescriptor],
        constraints: &Path,
    ) -> Result<(), RelayError>;

    /// Writes non-editable installed packages to `constraints`.
    fn pin_versions(&self, venv_dir: &Path, constraints: &Path) -> Result<(), RelayError>;

    /// Installs named packages.
    fn install_packages(&self, venv_dir: &Path, packages: &[&str]) -> Result<(), RelayError>;
}

fn editable_args(
    ref_root: &Path,
    descriptors: &[ProjectDescriptor],
    constraints: &Path,
) -> Vec<String> {
    let mut args = Vec::new();
    if constraints.is_file() {
        args.push(String::from("--constraint"));
        args.push(constraints.display().to_string());
    }
    for descriptor in descriptors {
        args.push(String::from("--editable"));
        args.push(descriptor.editable_target(ref_root));
    }
    args
}

fn venv_exists(venv_dir: &Path) -> bool {
    let exists = venv_python(venv_dir).exists();
    if exists {
        tracing::debug!(venv = %venv_dir.display(), "venv exists, not recreating");
    }
    exists
}

fn write_pins(constraints: &Path, frozen: &str) -> Result<(), RelayError> {
    if let Some(dir) = constraints.parent() {
        fs::create_dir_all(dir).map_err(RelayError::io(dir))?;
    }
    fs::write(constraints, frozen).map_err(RelayError::io(constraints))?;
    tracing::info!(
        constraints = %constraints.display(),
        pins = frozen.lines().filter(|l| !l.trim().is_empty()).count(),
        "pinned versions"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// pip
// ---------------------------------------------------------------------------

pub struct PipDriver {
    runner: Rc<dyn CommandRunner>,
}

impl PipDriver {
    pub fn new(runner: Rc<dyn CommandRunner>) -> Self {
        PipDriver { runner }
    }

    fn pip(venv_dir: &Path) -> CommandLine {
        CommandLine::new(venv_python(venv_dir)).args(["-m", "pip"])
    }
}

impl PackageDriver for PipDriver {
    fn kind(&self) -> PackageDriverKind {
        PackageDriverKind::Pip
    }

    fn create_venv(&self, base_python: &Path, venv_dir: &Path) -> Result<(), RelayError> {
        if venv_exists(venv_dir) {
            return Ok(());
        }
        self.runner.run(
            &CommandLine::new(base_python)
                .args(["-m", "venv"])
                .path_arg(venv_dir),
        )?;
        self.runner
            .run(&Self::pip(venv_dir).args(["install", "--upgrade", "pip"]))
    }

    fn install_dependencies(
        &self,
        venv_dir: &Path,
        ref_root: &Path,
        descriptors: &[ProjectDescriptor],
        constraints: &Path,
    ) -> Result<(), RelayError> {
        if descriptors.is_empty() {
            return Ok(());
        }
        self.runner.run(
            &Self::pip(venv_dir)
                .arg("install")
                .args(editable_args(ref_root, descriptors, constraints)),
        )
    }

    fn pin_versions(&self, venv_dir: &Path, constraints: &Path) -> Result<(), RelayError> {
        let frozen = self
            .runner
            .capture(&Self::pip(venv_dir).args(["freeze", "--exclude-editable"]))?;
        write_pins(constraints, &frozen)
    }

    fn install_packages(&self, venv_dir: &Path, packages: &[&str]) -> Result<(), RelayError> {
        self.runner
            .run(&Self::pip(venv_dir).arg("install").args(packages))
    }
}

// ---------------------------------------------------------------------------
// uv
// ---------------------------------------------------------------------------

pub struct UvDriver {
    runner: Rc<dyn CommandRunner>,
    uv: PathBuf,
}

impl UvDriver {
    pub fn new(runner: Rc<dyn CommandRunner>, uv: PathBuf) -> Self {
        UvDriver { runner, uv }
    }

    pub fn uv(&self) -> &Path {
        &self.uv
    }

    fn uv_pip(&self, subcommand: &str, venv_dir: &Path) -> CommandLine {
        CommandLine::new(&self.uv)
            .args(["pip", subcommand, "--python"])
            .path_arg(&venv_python(venv_dir))
    }
}

impl PackageDriver for UvDriver {
    fn kind(&self) -> PackageDriverKind {
        PackageDriverKind::Uv
    }

    fn create_venv(&self, base_python: &Path, venv_dir: &Path) -> Result<(), RelayError> {
        if venv_exists(venv_dir) {
            return Ok(());
        }
        self.runner.run(
            &CommandLine::new(&self.uv)
                .args(["venv", "--python"])
                .path_arg(base_python)
                .path_arg(venv_dir),
        )
    }

    fn install_dependencies(
        &self,
        venv_dir: &Path,
        ref_root: &Path,
        descriptors: &[ProjectDescriptor],
        constraints: &Path,
    ) -> Result<(), RelayError> {
        if descriptors.is_empty() {
            return Ok(());
        }
        self.runner.run(
            &self
                .uv_pip("install", venv_dir)
                .args(editable_args(ref_root, descriptors, constraints)),
        )
    }

    fn pin_versions(&self, venv_dir: &Path, constraints: &Path) -> Result<(), RelayError> {
        let frozen = self
            .runner
            .capture(&self.uv_pip("freeze", venv_dir).arg("--exclude-editable"))?;
        write_pins(constraints, &frozen)
    }

    fn install_packages(&self, venv_dir: &Path, packages: &[&str]) -> Result<(), RelayError> {
        self.runner
            .run(&self.uv_pip("install", venv_dir).args(packages))
    }
}

// ---------------------------------------------------------------------------
// selection
// ---------------------------------------------------------------------------

/// Where the bootstrap venv for `uv` lives under the cache dir.
pub fn uv_venv_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("venv").join("uv.venv")
}

/// Finds `uv` on `PATH`, or installs it into a cache venv created with pip.
pub fn provision_uv(
    runner: Rc<dyn CommandRunner>,
    base_python: &Path,
    cache_dir: &Path,
    path_var: Option<&str>,
) -> Result<PathBuf, RelayError> {
    if let Some(uv) = find_executable("uv", path_var) {
        tracing::debug!(uv = %uv.display(), "using uv from PATH");
        return Ok(uv);
    }
    let uv_venv = uv_venv_dir(cache_dir);
    let uv = venv_executable(&uv_venv, "uv");
    if uv.exists() {
        return Ok(uv);
    }
    tracing::info!(venv = %uv_venv.display(), "installing uv into cache venv");
    let pip = PipDriver::new(runner);
    pip.create_venv(base_python, &uv_venv)?;
    pip.install_packages(&uv_venv, &["uv"])?;
    Ok(uv)
}

/// Builds the driver for `kind`.
///
/// `uv` is provisioned on demand. When that fails and `uv` was not chosen
/// explicitly, pip is used instead.
pub fn make_driver(
    kind: PackageDriverKind,
    explicit: bool,
    runner: Rc<dyn CommandRunner>,
    base_python: &Path,
    cache_dir: &Path,
    path_var: Option<&str>,
) -> Result<Box<dyn PackageDriver>, RelayError> {
    match kind {
        PackageDriverKind::Pip => Ok(Box::new(PipDriver::new(runner))),
        PackageDriverKind::Uv => {
            match provision_uv(Rc::clone(&runner), base_python, cache_dir, path_var) {
                Ok(uv) => Ok(Box::new(UvDriver::new(runner, uv))),
                Err(err) if !explicit => {
                    tracing::warn!("uv unavailable ({}); falling back to pip", err);
                    Ok(Box::new(PipDriver::new(runner)))
                }
                Err(err) => Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRunner {
        commands: RefCell<Vec<String>>,
        frozen: String,
        fail: bool,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &CommandLine) -> Result<(), RelayError> {
            self.commands.borrow_mut().push(command.to_string());
            if self.fail {
                return Err(RelayError::CommandFailed {
                    command: command.to_string(),
                    status: String::from("exit status: 1"),
                });
            }
            Ok(())
        }

        fn capture(&self, command: &CommandLine) -> Result<String, RelayError> {
            self.commands.borrow_mut().push(command.to_string());
            Ok(self.frozen.clone())
        }
    }

    fn descriptors() -> Vec<ProjectDescriptor> {
        vec![
            ProjectDescriptor {
                build_root_dir_rel_path: String::from("app"),
                install_extras: vec![String::from("test")],
            },
            ProjectDescriptor {
                build_root_dir_rel_path: String::from("lib"),
                install_extras: Vec::new(),
            },
        ]
    }

    #[cfg(unix)]
    #[test]
    fn pip_installs_all_descriptors_in_one_command() {
        let dir = tempfile::tempdir().unwrap();
        let constraints = dir.path().join("constraints.txt");
        fs::write(&constraints, "requests==2.0\n").unwrap();

        let runner = Rc::new(RecordingRunner::default());
        let driver = PipDriver::new(runner.clone());
        driver
            .install_dependencies(Path::new("/r/venv"), Path::new("/r"), &descriptors(), &constraints)
            .unwrap();

        let commands = runner.commands.borrow();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0],
            format!(
                "/r/venv/bin/python -m pip install --constraint {} --editable '/r/app[test]' --editable /r/lib",
                constraints.display()
            )
        );
    }

    #[cfg(unix)]
    #[test]
    fn uv_skips_absent_constraints() {
        let runner = Rc::new(RecordingRunner::default());
        let driver = UvDriver::new(runner.clone(), PathBuf::from("/usr/bin/uv"));
        driver
            .install_dependencies(
                Path::new("/r/venv"),
                Path::new("/r"),
                &descriptors()[1..],
                Path::new("/nonexistent/constraints.txt"),
            )
            .unwrap();
        assert_eq!(
            runner.commands.borrow()[0],
            "/usr/bin/uv pip install --python /r/venv/bin/python --editable /r/lib"
        );
    }

    #[test]
    fn pin_versions_writes_frozen_output() {
        let dir = tempfile::tempdir().unwrap();
        let constraints = dir.path().join("env").join("constraints.txt");
        let runner = Rc::new(RecordingRunner {
            frozen: String::from("requests==2.31.0\nurllib3==2.0.0\n"),
            ..Default::default()
        });
        UvDriver::new(runner.clone(), PathBuf::from("uv"))
            .pin_versions(Path::new("/r/venv"), &constraints)
            .unwrap();
        assert_eq!(
            fs::read_to_string(&constraints).unwrap(),
            "requests==2.31.0\nurllib3==2.0.0\n"
        );
        assert!(runner.commands.borrow()[0].starts_with("uv pip freeze --python "));
        assert!(runner.commands.borrow()[0].ends_with(" --exclude-editable"));
    }

    #[test]
    fn existing_venv_is_not_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let venv = dir.path().join("venv");
        let python = venv_python(&venv);
        fs::create_dir_all(python.parent().unwrap()).unwrap();
        fs::write(&python, b"").unwrap();

        let runner = Rc::new(RecordingRunner::default());
        PipDriver::new(runner.clone())
            .create_venv(Path::new("/usr/bin/python3"), &venv)
            .unwrap();
        assert!(runner.commands.borrow().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn pip_create_venv_upgrades_pip() {
        let runner = Rc::new(RecordingRunner::default());
        PipDriver::new(runner.clone())
            .create_venv(Path::new("/usr/bin/python3"), Path::new("/nonexistent/venv"))
            .unwrap();
        assert_eq!(
            *runner.commands.borrow(),
            vec![
                "/usr/bin/python3 -m venv /nonexistent/venv",
                "/nonexistent/venv/bin/python -m pip install --upgrade pip",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn uv_is_provisioned_into_cache_venv() {
        let runner = Rc::new(RecordingRunner::default());
        let empty_path = tempfile::tempdir().unwrap();
        let uv = provision_uv(
            runner.clone(),
            Path::new("/usr/bin/python3"),
            Path::new("/nonexistent/cache"),
            empty_path.path().to_str(),
        )
        .unwrap();
        assert_eq!(uv, PathBuf::from("/nonexistent/cache/venv/uv.venv/bin/uv"));
        assert_eq!(
            runner.commands.borrow().last().unwrap(),
            "/nonexistent/cache/venv/uv.venv/bin/python -m pip install uv"
        );
    }

    #[test]
    fn implicit_uv_falls_back_to_pip() {
        let runner: Rc<dyn CommandRunner> = Rc::new(RecordingRunner {
            fail: true,
            ..Default::default()
        });
        let cache = tempfile::tempdir().unwrap();
        let empty_path = tempfile::tempdir().unwrap();
        let args = (
            Path::new("/usr/bin/python3"),
            cache.path(),
            empty_path.path().to_str(),
        );

        let driver = make_driver(PackageDriverKind::Uv, false, runner.clone(), args.0, args.1, args.2)
            .unwrap();
        assert_eq!(driver.kind(), PackageDriverKind::Pip);

        let err = make_driver(PackageDriverKind::Uv, true, runner, args.0, args.1, args.2);
        assert!(err.is_err());
    }
}
