//! Stderr and per-invocation file logging.
//!
//! One `tracing-subscriber` registry carries two `fmt` layers. The stderr
//! layer is filtered by the level resolved from the environment and flags.
//! The file layer is filtered at `DEBUG` and writes through a [`LogSink`],
//! which discards events until a log file is attached: the log dir is only
//! known once the env leap is loaded, long after stderr logging starts.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// Stderr levels from quietest to most verbose.
const LEVELS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

/// Parses a `PROTOPRIMER_STDERR_LOG_LEVEL` value.
pub fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "OFF" => Ok(LevelFilter::OFF),
        "ERROR" | "CRITICAL" => Ok(LevelFilter::ERROR),
        "WARN" | "WARNING" => Ok(LevelFilter::WARN),
        "INFO" => Ok(LevelFilter::INFO),
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "TRACE" => Ok(LevelFilter::TRACE),
        other => Err(format!(
            "unknown log level `{}` (expected ERROR, WARN, INFO, DEBUG, TRACE or OFF)",
            other
        )),
    }
}

/// Resolves the stderr level: `--silent`, then `-q`, then the baseline
/// lowered one step per `-v`.
pub fn resolve_stderr_level(
    baseline: LevelFilter,
    verbose: u8,
    quiet: bool,
    silent: bool,
) -> LevelFilter {
    if silent {
        return LevelFilter::OFF;
    }
    if quiet {
        return LevelFilter::WARN;
    }
    let start = LEVELS
        .iter()
        .position(|level| *level == baseline)
        .unwrap_or(3);
    let index = (start + usize::from(verbose)).min(LEVELS.len() - 1);
    LEVELS[index]
}

/// Late-bound log file shared by the file layer.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    file: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    /// Opens `path` for appending and routes file-layer events to it.
    pub fn attach(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.file.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Writer handed out per event by [`LogSink`].
pub struct SinkWriter {
    file: Arc<Mutex<Option<File>>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            file: Arc::clone(&self.file),
        }
    }
}

/// Installs the global subscriber. Returns `false` when one is already set
/// (re-entry within one process, e.g. tests), in which case the existing
/// subscriber stays in charge.
pub fn init_logging(stderr_level: LevelFilter, sink: &LogSink) -> bool {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(stderr_level);
    let file = tracing_subscriber::fmt::layer()
        .with_writer(sink.clone())
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);
    tracing_subscriber::registry()
        .with(stderr)
        .with(file)
        .try_init()
        .is_ok()
}

/// `<log_dir>/<entry_script_basename>.<start_id>.log`
pub fn log_file_name(entry_script_basename: &str, start_id: &str) -> String {
    format!("{}.{}.log", entry_script_basename, start_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("warning").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level(" DEBUG ").unwrap(), LevelFilter::DEBUG);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn flags_adjust_baseline() {
        let info = LevelFilter::INFO;
        assert_eq!(resolve_stderr_level(info, 0, false, false), LevelFilter::INFO);
        assert_eq!(resolve_stderr_level(info, 1, false, false), LevelFilter::DEBUG);
        assert_eq!(resolve_stderr_level(info, 9, false, false), LevelFilter::TRACE);
        assert_eq!(resolve_stderr_level(LevelFilter::ERROR, 1, false, false), LevelFilter::WARN);
        assert_eq!(resolve_stderr_level(info, 2, true, false), LevelFilter::WARN);
        assert_eq!(resolve_stderr_level(info, 0, true, true), LevelFilter::OFF);
    }

    #[test]
    fn sink_discards_until_attached() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::default();
        sink.make_writer().write_all(b"dropped\n").unwrap();
        assert!(!sink.is_attached());

        let path = dir.path().join("log").join("proto_kernel.abc.log");
        sink.attach(&path).unwrap();
        sink.make_writer().write_all(b"kept\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "kept\n");
    }

    #[test]
    fn file_name_convention() {
        assert_eq!(log_file_name("proto_kernel", "0123abcd"), "proto_kernel.0123abcd.log");
    }
}
