//! The next process image of a relay hop.
//!
//! A [`ProcessImage`] is built from the current invocation and adjusted with
//! builder methods before it is handed to a
//! [`ProcessExecutor`](crate::exec::ProcessExecutor):
//!
//! ```text
//! ProcessImage::relaunch(proto_code, &argv, &env)
//!     .strip_venv()
//!     .prepend_path(python_dir)
//!     .with_stride(PyExec::Required, start_id)
//! ```
//!
//! The environment is complete: the executor clears the inherited
//! environment and applies exactly `env`.

use std::env;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::python::venv_bin_dir;
use crate::stride::PyExec;
use crate::vars;

/// Program, arguments and full environment of a process to replace into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessImage {
    pub program: PathBuf,
    /// Arguments after the program name.
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
}

impl ProcessImage {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProcessImage {
            program: program.into(),
            args: Vec::new(),
            env: IndexMap::new(),
        }
    }

    /// Re-runs `program` with the current arguments (`argv[0]` dropped) and
    /// environment.
    pub fn relaunch(program: &Path, argv: &[String], env: &IndexMap<String, String>) -> Self {
        ProcessImage {
            program: program.to_path_buf(),
            args: argv.iter().skip(1).cloned().collect(),
            env: env.clone(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env_var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn env_remove(mut self, key: &str) -> Self {
        self.env.shift_remove(key);
        self
    }

    /// Records the stride reached, the start id and the proto-code path.
    pub fn with_stride(self, stride: PyExec, start_id: &str) -> Self {
        let proto_code = self.program.display().to_string();
        self.env_var(vars::PROTOPRIMER_PY_EXEC, stride.as_str())
            .env_var(vars::PROTOPRIMER_START_ID, start_id)
            .env_var(vars::PROTOPRIMER_PROTO_CODE, proto_code)
    }

    /// Deactivates the current venv: drops `VIRTUAL_ENV` and `PYTHONHOME`
    /// and removes the venv's directories from `PATH`.
    pub fn strip_venv(mut self) -> Self {
        if let Some(venv) = self.env.shift_remove(vars::VIRTUAL_ENV) {
            let venv = PathBuf::from(venv);
            self.filter_path(|dir| !dir.starts_with(&venv));
        }
        self.env.shift_remove(vars::PYTHONHOME);
        self
    }

    /// Puts `dir` first on `PATH`, removing later duplicates.
    pub fn prepend_path(mut self, dir: &Path) -> Self {
        self.filter_path(|entry| entry != dir);
        let mut entries = vec![dir.to_path_buf()];
        entries.extend(self.path_entries());
        self.set_path(entries);
        self
    }

    /// Activates `venv_dir` the way its `activate` script does.
    pub fn activate_venv(self, venv_dir: &Path) -> Self {
        self.strip_venv()
            .prepend_path(&venv_bin_dir(venv_dir))
            .env_var(vars::VIRTUAL_ENV, venv_dir.display().to_string())
    }

    /// Sets `--flag=value`, replacing earlier occurrences.
    ///
    /// Only arguments before a `--` separator are considered options.
    pub fn with_option(mut self, flag: &str, value: &str) -> Self {
        let prefix = format!("{}=", flag);
        let split = self
            .args
            .iter()
            .position(|arg| arg == "--")
            .unwrap_or(self.args.len());
        let mut options: Vec<String> = Vec::with_capacity(split + 1);
        let mut iter = self.args.drain(..split);
        while let Some(arg) = iter.next() {
            if arg == flag {
                iter.next();
            } else if !arg.starts_with(&prefix) {
                options.push(arg);
            }
        }
        drop(iter);
        options.insert(0, format!("{}{}", prefix, value));
        options.append(&mut self.args);
        self.args = options;
        self
    }

    /// Human-readable command line for logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = shell_word(&self.program.display().to_string());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_word(arg));
        }
        line
    }

    fn path_entries(&self) -> Vec<PathBuf> {
        self.env
            .get(vars::PATH)
            .map(|value| env::split_paths(value).collect())
            .unwrap_or_default()
    }

    fn filter_path(&mut self, keep: impl Fn(&Path) -> bool) {
        if !self.env.contains_key(vars::PATH) {
            return;
        }
        let entries: Vec<PathBuf> = self
            .path_entries()
            .into_iter()
            .filter(|entry| keep(entry.as_path()))
            .collect();
        self.set_path(entries);
    }

    fn set_path(&mut self, entries: Vec<PathBuf>) {
        // Entries came from a valid PATH or are plain directories.
        if let Ok(joined) = env::join_paths(entries) {
            self.env
                .insert(vars::PATH.to_string(), joined.to_string_lossy().into_owned());
        }
    }
}

/// Quotes `word` for display when it contains shell-special characters.
pub(crate) fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> IndexMap<String, String> {
        let mut env = IndexMap::new();
        env.insert(
            "PATH".to_string(),
            "/other/venv/bin:/usr/local/bin:/usr/bin".to_string(),
        );
        env.insert("VIRTUAL_ENV".to_string(), "/other/venv".to_string());
        env.insert("PYTHONHOME".to_string(), "/other".to_string());
        env.insert("HOME".to_string(), "/home/u".to_string());
        env
    }

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[test]
    fn strip_venv_removes_venv_entries() {
        let image = ProcessImage::relaunch(Path::new("/r/proto_kernel"), &argv(&["x"]), &base_env())
            .strip_venv();
        assert_eq!(image.env["PATH"], "/usr/local/bin:/usr/bin");
        assert!(!image.env.contains_key("VIRTUAL_ENV"));
        assert!(!image.env.contains_key("PYTHONHOME"));
        assert_eq!(image.env["HOME"], "/home/u");
    }

    #[cfg(unix)]
    #[test]
    fn activate_venv_puts_bin_first() {
        let image = ProcessImage::relaunch(Path::new("/r/proto_kernel"), &argv(&["x"]), &base_env())
            .activate_venv(Path::new("/r/venv"));
        assert_eq!(image.env["PATH"], "/r/venv/bin:/usr/local/bin:/usr/bin");
        assert_eq!(image.env["VIRTUAL_ENV"], "/r/venv");
    }

    #[cfg(unix)]
    #[test]
    fn prepend_path_deduplicates() {
        let image = ProcessImage::relaunch(Path::new("/p"), &argv(&["x"]), &base_env())
            .prepend_path(Path::new("/usr/bin"));
        assert_eq!(image.env["PATH"], "/usr/bin:/other/venv/bin:/usr/local/bin");
    }

    #[test]
    fn relaunch_keeps_arguments_and_records_stride() {
        let image = ProcessImage::relaunch(
            Path::new("/r/proto_kernel"),
            &argv(&["proto_kernel", "start", "-v"]),
            &IndexMap::new(),
        )
        .with_stride(PyExec::Venv, "abc123");
        assert_eq!(image.args, vec!["start", "-v"]);
        assert_eq!(image.env["PROTOPRIMER_PY_EXEC"], "py_venv");
        assert_eq!(image.env["PROTOPRIMER_START_ID"], "abc123");
        assert_eq!(image.env["PROTOPRIMER_PROTO_CODE"], "/r/proto_kernel");
    }

    #[test]
    fn with_option_replaces_existing_values() {
        let image = ProcessImage::new("/p")
            .args(["wizard", "--wizard-stage", "wizard_started", "-v", "--", "--wizard-stage=x"])
            .with_option("--wizard-stage", "wizard_finished");
        assert_eq!(
            image.args,
            vec![
                "--wizard-stage=wizard_finished",
                "wizard",
                "-v",
                "--",
                "--wizard-stage=x"
            ]
        );

        let image = ProcessImage::new("/p")
            .args(["--wizard-stage=wizard_started"])
            .with_option("--wizard-stage", "wizard_finished");
        assert_eq!(image.args, vec!["--wizard-stage=wizard_finished"]);
    }

    #[test]
    fn command_line_quotes_special_words() {
        let image = ProcessImage::new("/usr/bin/python3").args(["-c", "print('hi')"]);
        assert_eq!(image.command_line(), r#"/usr/bin/python3 -c 'print('\''hi'\'')'"#);
    }
}
