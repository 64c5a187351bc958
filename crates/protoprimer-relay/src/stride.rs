//! Stride markers and interpreter categories.
//!
//! A stride is how far the relay has advanced. It is carried across process
//! replacements in `PROTOPRIMER_PY_EXEC` and only ever increases.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::python::same_path;

/// Ordered bootstrap strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PyExec {
    /// Nothing known yet: a fresh start.
    #[default]
    Unknown,
    /// Running outside any foreign venv.
    Arbitrary,
    /// Running under the required base python.
    Required,
    /// Running inside the configured venv.
    Venv,
    /// Dependencies installed and pinned.
    DepsUpdated,
    /// Proto-code rewritten from the installed kernel.
    SrcUpdated,
}

impl PyExec {
    pub const ALL: [PyExec; 6] = [
        PyExec::Unknown,
        PyExec::Arbitrary,
        PyExec::Required,
        PyExec::Venv,
        PyExec::DepsUpdated,
        PyExec::SrcUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PyExec::Unknown => "py_unknown",
            PyExec::Arbitrary => "py_arbitrary",
            PyExec::Required => "py_required",
            PyExec::Venv => "py_venv",
            PyExec::DepsUpdated => "deps_updated",
            PyExec::SrcUpdated => "src_updated",
        }
    }

    /// Legacy spelling, also accepted on input.
    fn alias(&self) -> &'static str {
        match self {
            PyExec::Unknown => "py_exec_unknown",
            PyExec::Arbitrary => "py_exec_arbitrary",
            PyExec::Required => "py_exec_required",
            PyExec::Venv => "py_exec_venv",
            PyExec::DepsUpdated => "py_exec_deps_updated",
            PyExec::SrcUpdated => "py_exec_src_updated",
        }
    }
}

impl fmt::Display for PyExec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PyExec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        PyExec::ALL
            .iter()
            .copied()
            .find(|stride| stride.as_str() == raw || stride.alias() == raw)
            .ok_or_else(|| {
                let known: Vec<&str> = PyExec::ALL.iter().map(PyExec::as_str).collect();
                format!("unknown stride `{}` (expected one of {})", raw, known.join(", "))
            })
    }
}

/// Which interpreter environment the current process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PyExecCategory {
    /// No venv active.
    Base,
    /// A venv other than the configured one.
    ArbitraryVenv,
    /// The configured venv.
    RequiredVenv,
}

impl PyExecCategory {
    /// Classifies from `VIRTUAL_ENV` against the configured venv dir.
    pub fn detect(virtual_env: Option<&Path>, required_venv: &Path) -> Self {
        match virtual_env {
            None => PyExecCategory::Base,
            Some(active) if same_path(active, required_venv) => PyExecCategory::RequiredVenv,
            Some(_) => PyExecCategory::ArbitraryVenv,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PyExecCategory::Base => "base",
            PyExecCategory::ArbitraryVenv => "arbitrary_venv",
            PyExecCategory::RequiredVenv => "required_venv",
        }
    }
}

impl fmt::Display for PyExecCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
