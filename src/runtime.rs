//! OCI runtime trait and signal handling.
//!
//! The trait mirrors the OCI runtime command line:
//! - `create`: spawn the init supervisor for a bundle, blocked
//! - `start`: release the supervisor
//! - `state`: report (and self-heal) the record
//! - `kill`: deliver a signal
//! - `delete`: stop best-effort and remove the record
//! - `wait`: reap the process (parent only)
//!
//! # OCI Runtime Spec Reference
//!
//! See: https://github.com/opencontainers/runtime-spec/blob/main/runtime.md

use crate::error::Result;
use crate::state::ContainerState;
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

// =============================================================================
// Signals
// =============================================================================

/// Signal to send to a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM (graceful shutdown). The default.
    #[default]
    Term,
    /// SIGKILL (force kill).
    Kill,
    /// SIGINT (interrupt).
    Int,
    /// SIGHUP (hangup).
    Hup,
    /// Any other signal, by number.
    Raw(i32),
}

impl Signal {
    /// Returns the signal number.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Term => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
            Self::Int => libc::SIGINT,
            Self::Hup => libc::SIGHUP,
            Self::Raw(n) => *n,
        }
    }

    /// Maps a signal number to the named variant when there is one.
    pub fn from_number(n: i32) -> Self {
        match n {
            libc::SIGTERM => Self::Term,
            libc::SIGKILL => Self::Kill,
            libc::SIGINT => Self::Int,
            libc::SIGHUP => Self::Hup,
            other => Self::Raw(other),
        }
    }

    /// Parses a caller-supplied signal. Never fails.
    ///
    /// - `""` → `Term`
    /// - `"TERM"`, `"SIGKILL"`, `"int"`, ... (SIG prefix optional, any case)
    /// - `"9"`, `"-9"` → by number; `"0"` probes for existence
    /// - anything unrecognized → `Term`
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return Self::Term;
        }

        let digits = s.strip_prefix('-').unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return match digits.parse::<i32>() {
                Ok(n) if n >= 0 => Self::from_number(n),
                _ => {
                    warn!("Invalid signal number '{}', using SIGTERM", s);
                    Self::Term
                }
            };
        }

        let upper = s.to_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "TERM" => Self::Term,
            "KILL" => Self::Kill,
            "INT" => Self::Int,
            "HUP" => Self::Hup,
            _ => {
                warn!("Unrecognized signal '{}', using SIGTERM", s);
                Self::Term
            }
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Term => write!(f, "SIGTERM"),
            Self::Kill => write!(f, "SIGKILL"),
            Self::Int => write!(f, "SIGINT"),
            Self::Hup => write!(f, "SIGHUP"),
            Self::Raw(n) => write!(f, "signal {}", n),
        }
    }
}

// =============================================================================
// OCI Runtime Trait
// =============================================================================

/// OCI runtime interface for a single container.
///
/// # Lifecycle
///
/// ```text
/// create(id, bundle) → start(id) → [kill(id, signal)] → delete(id)
/// ```
///
/// Every call is independent: implementations keep nothing in memory between
/// calls, so each may come from a separate process invocation.
#[async_trait]
pub trait OciRuntime: Send + Sync {
    /// Returns the runtime name.
    fn name(&self) -> &str;

    /// Creates a container from an OCI bundle without running it.
    ///
    /// Returns once the process exists and holds its full description; the
    /// PID recorded in state is final.
    async fn create(&self, id: &str, bundle: &Path) -> Result<()>;

    /// Starts a created container. A running container is left alone.
    async fn start(&self, id: &str) -> Result<()>;

    /// Gets the state of a container, correcting a stale `running` status.
    async fn state(&self, id: &str) -> Result<ContainerState>;

    /// Sends a signal to a container. Unknown containers are a no-op.
    async fn kill(&self, id: &str, signal: Signal) -> Result<()>;

    /// Stops a container best-effort and removes its record. Unknown
    /// containers are a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Waits for a container to exit and returns its exit code.
    ///
    /// Only possible from the process that created the container.
    async fn wait(&self, id: &str) -> Result<i32> {
        let _ = id;
        Err(crate::error::Error::Internal(format!(
            "wait not supported by {} runtime",
            self.name()
        )))
    }
}
