//! Environment variable names read or written by protoprimer.

pub const PROTOPRIMER_PY_EXEC: &str = "PROTOPRIMER_PY_EXEC";
pub const PROTOPRIMER_START_ID: &str = "PROTOPRIMER_START_ID";
pub const PROTOPRIMER_PROTO_CODE: &str = "PROTOPRIMER_PROTO_CODE";
pub const PROTOPRIMER_STDERR_LOG_LEVEL: &str = "PROTOPRIMER_STDERR_LOG_LEVEL";
/// `true`/`false`; overrides whether dependencies are installed.
pub const PROTOPRIMER_DO_INSTALL: &str = "PROTOPRIMER_DO_INSTALL";
pub const PROTOPRIMER_PACKAGE_DRIVER: &str = "PROTOPRIMER_PACKAGE_DRIVER";
pub const PROTOPRIMER_RUN_MODE: &str = "PROTOPRIMER_RUN_MODE";
/// `<module>:<func>` started in [start] mode.
pub const PROTOPRIMER_MAIN_FUNC: &str = "PROTOPRIMER_MAIN_FUNC";
/// Path of the launcher script that started the proto-code; names the log file.
pub const PROTOPRIMER_ENTRY_SCRIPT: &str = "PROTOPRIMER_ENTRY_SCRIPT";

pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";
pub const PATH: &str = "PATH";
pub const PYTHONHOME: &str = "PYTHONHOME";
