//! Logging setup and the diagnostic error log.
//!
//! Two independent outputs:
//!
//! - `tracing` events go to stderr, filtered by `RUNPROC_LOG` (EnvFilter
//!   syntax, default `warn`). stdout is left to command output and to the
//!   managed program, which inherits it.
//! - When the caller passes `--log <path>` (containerd's shims do), each
//!   failure is written there as one JSON line the shim can surface:
//!
//! ```json
//! {"level":"error","msg":"container not found: web","time":"2026-01-01T00:00:00Z"}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `filter` is an EnvFilter directive such as `debug` or `runproc=trace`;
/// `None` or an unparsable directive falls back to `warn`. Calling twice is
/// harmless.
pub fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// One diagnostic log entry.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub level: &'a str,
    pub msg: &'a str,
    pub time: String,
}

impl<'a> LogEntry<'a> {
    /// Builds an `error` entry stamped with the current time.
    pub fn error(msg: &'a str) -> Self {
        Self {
            level: "error",
            msg,
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }
}

/// Writes `msg` to the diagnostic log at `path`, replacing its contents.
///
/// Best-effort: a missing path is a no-op and write failures are ignored,
/// so reporting an error can never itself fail the command.
pub fn write_error_log(path: Option<&Path>, msg: &str) {
    let Some(path) = path else {
        return;
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && fs::create_dir_all(parent).is_err()
    {
        return;
    }

    let Ok(mut line) = serde_json::to_string(&LogEntry::error(msg)) else {
        return;
    };
    line.push('\n');
    let _ = fs::write(path, line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_error_log_single_json_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("log.json");

        write_error_log(Some(&path), "first");
        write_error_log(Some(&path), "second \"quoted\"");

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1, "log should be overwritten");

        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["msg"], "second \"quoted\"");
        assert!(value["time"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_error_log_without_path_is_noop() {
        write_error_log(None, "ignored");
    }
}
