//! Command-line surface of the proto-code.
//!
//! ```text
//! proto_kernel [<run_mode>] [options] [-- <user args>]
//! ```
//!
//! Hidden options are set by the relay itself or by test harnesses; their
//! environment variable counterparts are the usual carrier across re-execs.

use std::fmt;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use protoprimer_relay::PyExec;

/// What the invocation is for; selects the target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum RunMode {
    /// Bootstrap the venv and install dependencies.
    Prime,
    /// Print the effective configuration.
    Config,
    /// Capture configuration interactively.
    Wizard,
    /// Print the state graph.
    Graph,
    /// Rebuild the venv from scratch.
    Upgrade,
    /// Prime, then hand over to the application.
    Start,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Prime => "prime",
            RunMode::Config => "config",
            RunMode::Wizard => "wizard",
            RunMode::Graph => "graph",
            RunMode::Upgrade => "upgrade",
            RunMode::Start => "start",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the wizard still has to prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum WizardStage {
    #[default]
    #[value(name = "wizard_started")]
    WizardStarted,
    #[value(name = "wizard_finished")]
    WizardFinished,
}

impl WizardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStage::WizardStarted => "wizard_started",
            WizardStage::WizardFinished => "wizard_finished",
        }
    }
}

/// Bootstrap any checkout into a provisioned venv, then run the application.
#[derive(Debug, Clone, Parser)]
#[command(name = "protoprimer", version)]
pub struct ParsedArgs {
    /// Run mode; defaults to `PROTOPRIMER_RUN_MODE`, then `prime`.
    #[arg(value_enum)]
    pub run_mode: Option<RunMode>,

    /// Env dir (relative to the ref root) selected when the env symlink is
    /// created. The last occurrence wins.
    #[arg(long = "env", value_name = "REL_PATH")]
    pub env: Vec<String>,

    /// Log more to stderr; repeatable.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log warnings and errors only.
    #[arg(short, long)]
    pub quiet: bool,

    /// Log nothing to stderr.
    #[arg(long)]
    pub silent: bool,

    /// Ref root; the primer file becomes optional.
    #[arg(long, value_name = "DIR")]
    pub ref_root: Option<PathBuf>,

    /// Env dir selected when the env symlink is created; wins over `--env`.
    #[arg(long, value_name = "DIR")]
    pub local_env_dir: Option<PathBuf>,

    /// State to evaluate instead of the run mode's target.
    #[arg(long, value_name = "STATE")]
    pub final_state: Option<String>,

    /// Write a launcher script here once the target is reached. It starts
    /// `PROTOPRIMER_MAIN_FUNC` when that is set, otherwise it primes.
    #[arg(long, value_name = "PATH")]
    pub entry_script: Option<PathBuf>,

    #[arg(long, hide = true)]
    pub py_exec: Option<PyExec>,

    #[arg(long, hide = true)]
    pub start_id: Option<String>,

    #[arg(long, hide = true)]
    pub proto_code: Option<PathBuf>,

    #[arg(long, hide = true, value_enum)]
    pub wizard_stage: Option<WizardStage>,

    /// Arguments passed to the application in [start].
    #[arg(last = true)]
    pub user_args: Vec<String>,
}

impl ParsedArgs {
    /// The effective `--env` value.
    pub fn selected_env(&self) -> Option<&str> {
        self.env.last().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ParsedArgs {
        ParsedArgs::try_parse_from(std::iter::once("proto_kernel").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.run_mode, None);
        assert_eq!(args.verbose, 0);
        assert!(args.user_args.is_empty());
    }

    #[test]
    fn last_env_wins() {
        let args = parse(&["prime", "--env", "a_env", "--env", "b_env"]);
        assert_eq!(args.run_mode, Some(RunMode::Prime));
        assert_eq!(args.selected_env(), Some("b_env"));
    }

    #[test]
    fn verbosity_counts() {
        assert_eq!(parse(&["-vv"]).verbose, 2);
        assert!(parse(&["-q"]).quiet);
        assert!(parse(&["--silent"]).silent);
    }

    #[test]
    fn user_args_follow_separator() {
        let args = parse(&["start", "--", "--port", "8080"]);
        assert_eq!(args.run_mode, Some(RunMode::Start));
        assert_eq!(args.user_args, vec!["--port", "8080"]);
    }

    #[test]
    fn hidden_relay_options() {
        let args = parse(&[
            "--py-exec",
            "py_venv",
            "--start-id",
            "abc",
            "--wizard-stage=wizard_finished",
        ]);
        assert_eq!(args.py_exec, Some(PyExec::Venv));
        assert_eq!(args.start_id.as_deref(), Some("abc"));
        assert_eq!(args.wizard_stage, Some(WizardStage::WizardFinished));
    }

    #[test]
    fn bad_stride_is_rejected() {
        let err = ParsedArgs::try_parse_from(["proto_kernel", "--py-exec", "py_nowhere"]);
        assert!(err.is_err());
    }
}
