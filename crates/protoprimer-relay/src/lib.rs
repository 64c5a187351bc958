//! Multi-stage relay for protoprimer.
//!
//! The bootstrap advances through ordered strides ([`PyExec`]). Each stride
//! that changes the interpreter environment ends with a process replacement
//! into the proto-code, carrying the new stride marker, the start id and the
//! proto-code path in the environment. This crate holds everything the relay
//! touches outside the state graph:
//!
//! - [`stride`] -- stride markers and interpreter categories
//! - [`image`] -- [`ProcessImage`], the next process to replace into
//! - [`exec`] -- [`ProcessExecutor`]: real `exec` and test interception
//! - [`command`] -- [`CommandLine`] and [`CommandRunner`] for subprocesses
//! - [`driver`] -- [`PackageDriver`] strategies for pip and uv
//! - [`python`] -- venv layout and `PATH` lookup
//! - [`proto_code`] -- keeping the proto-code equal to the installed kernel
//! - [`vars`] -- environment variable names shared by every crate

pub mod command;
pub mod driver;
pub mod error;
pub mod exec;
pub mod image;
pub mod proto_code;
pub mod python;
pub mod stride;
pub mod vars;

pub use command::{CommandLine, CommandRunner, SystemCommandRunner};
pub use driver::{make_driver, PackageDriver, PipDriver, UvDriver};
pub use error::RelayError;
pub use exec::{InterceptExecutor, ProcessExecutor, SystemExecutor};
pub use image::ProcessImage;
pub use proto_code::ProtoCodeSync;
pub use stride::{PyExec, PyExecCategory};
