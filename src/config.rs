//! Runtime configuration.
//!
//! Everything the controller would otherwise pick up from the process
//! environment is carried here instead. Only the command-line adapter
//! (`bin/runproc.rs`) reads environment variables; it builds a
//! [`RuntimeConfig`] and hands it to [`crate::runtimes::ProcessRuntime`].

use crate::constants::{
    DEFAULT_STATE_ROOT, DELETE_KILL_TIMEOUT, DELETE_POLL_INTERVAL, START_POLL_INTERVAL,
};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory holding one subdirectory per container.
    pub state_root: PathBuf,
    /// Binary re-invoked as `init` by `create`.
    ///
    /// Defaults to the current executable. Tests and embedders that link the
    /// library into another binary point this at the `runproc` binary.
    pub init_binary: PathBuf,
    /// How often the supervisor checks for the start marker.
    pub start_poll_interval: Duration,
    /// How often `delete` re-checks liveness after SIGKILL.
    pub delete_poll_interval: Duration,
    /// How long `delete` waits for the process to die.
    pub delete_timeout: Duration,
}

impl RuntimeConfig {
    /// Creates a configuration for `state_root` with default timings.
    ///
    /// A relative state root is made absolute against the current directory,
    /// since the supervisor runs with the bundle as its working directory.
    pub fn new(state_root: impl AsRef<Path>) -> Result<Self> {
        let state_root = std::path::absolute(state_root.as_ref())?;
        let init_binary = std::env::current_exe().map_err(|e| {
            Error::Internal(format!("cannot resolve current executable: {}", e))
        })?;

        Ok(Self {
            state_root,
            init_binary,
            start_poll_interval: START_POLL_INTERVAL,
            delete_poll_interval: DELETE_POLL_INTERVAL,
            delete_timeout: DELETE_KILL_TIMEOUT,
        })
    }

    /// Creates a configuration for the default state root.
    pub fn with_default_root() -> Result<Self> {
        Self::new(DEFAULT_STATE_ROOT)
    }

    /// Overrides the binary spawned as the init supervisor.
    pub fn with_init_binary(mut self, init_binary: impl Into<PathBuf>) -> Self {
        self.init_binary = init_binary.into();
        self
    }

    /// Overrides the supervisor's start-marker poll interval.
    pub fn with_start_poll_interval(mut self, interval: Duration) -> Self {
        self.start_poll_interval = interval;
        self
    }

    /// Overrides delete's poll interval and give-up timeout.
    pub fn with_delete_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.delete_poll_interval = interval;
        self.delete_timeout = timeout;
        self
    }
}
