//! Process inputs and side-effect seams.
//!
//! Nodes never read `std::env` or touch stdio directly. They go through the
//! [`Runtime`] captured at startup, which is what lets integration tests run
//! whole bootstraps in-process against a scratch ref root.

use std::cell::RefCell;
use std::env;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;

use protoprimer_relay::{
    CommandRunner, ProcessExecutor, SystemCommandRunner, SystemExecutor,
};

use crate::logging::LogSink;

/// Everything a bootstrap reads from or does to its process.
pub struct Runtime {
    /// Full argument vector, program name first.
    pub argv: Vec<String>,
    /// Environment snapshot.
    pub env: IndexMap<String, String>,
    pub cwd: PathBuf,
    /// Path of the running kernel; the proto-code when no override is given.
    pub current_exe: PathBuf,
    pub executor: Rc<dyn ProcessExecutor>,
    pub runner: Rc<dyn CommandRunner>,
    /// Wizard answers.
    pub input: RefCell<Box<dyn BufRead>>,
    /// Wizard prompts and rendered output (config, graph).
    pub output: RefCell<Box<dyn Write>>,
    pub log_sink: LogSink,
}

impl Runtime {
    /// A runtime with system seams and stdio.
    pub fn new(
        argv: Vec<String>,
        env: IndexMap<String, String>,
        cwd: PathBuf,
        current_exe: PathBuf,
    ) -> Self {
        Runtime {
            argv,
            env,
            cwd,
            current_exe,
            executor: Rc::new(SystemExecutor),
            runner: Rc::new(SystemCommandRunner),
            input: RefCell::new(Box::new(BufReader::new(io::stdin()))),
            output: RefCell::new(Box::new(io::stdout())),
            log_sink: LogSink::default(),
        }
    }

    /// Captures the current process. Non-UTF-8 environment entries are
    /// dropped; non-UTF-8 arguments are converted lossily.
    pub fn from_process() -> io::Result<Self> {
        let argv = env::args_os()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let vars = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Ok(Runtime::new(argv, vars, env::current_dir()?, env::current_exe()?))
    }

    pub fn with_executor(mut self, executor: Rc<dyn ProcessExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_runner(mut self, runner: Rc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_input(mut self, input: Box<dyn BufRead>) -> Self {
        self.input = RefCell::new(input);
        self
    }

    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = RefCell::new(output);
        self
    }

    /// A non-empty environment variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// `path` made absolute against the working directory.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            protoprimer_config::paths::join_clean(&self.cwd, path)
        }
    }

    /// Writes `text` to the output seam.
    pub fn print(&self, text: &str) -> io::Result<()> {
        let mut output = self.output.borrow_mut();
        output.write_all(text.as_bytes())?;
        output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(vars: &[(&str, &str)]) -> Runtime {
        let env = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Runtime::new(
            vec![String::from("proto_kernel")],
            env,
            PathBuf::from("/work"),
            PathBuf::from("/r/proto_kernel"),
        )
    }

    #[test]
    fn empty_vars_read_as_unset() {
        let rt = runtime(&[("PROTOPRIMER_MAIN_FUNC", ""), ("HOME", "/home/u")]);
        assert_eq!(rt.var("PROTOPRIMER_MAIN_FUNC"), None);
        assert_eq!(rt.var("HOME"), Some("/home/u"));
        assert_eq!(rt.var("MISSING"), None);
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let rt = runtime(&[]);
        assert_eq!(rt.absolute(Path::new("./envs/a")), PathBuf::from("/work/envs/a"));
        assert_eq!(rt.absolute(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
