//! # Runtime Constants
//!
//! Default paths, file names, poll intervals, and configuration keys for the
//! runtime. Everything the controller and the init supervisor must agree on
//! lives here, since the two roles run in different processes and only share
//! the filesystem.
//!
//! ## Cross-References
//!
//! - [`crate::storage`]: Uses the state file and marker names
//! - [`crate::runtimes`]: Uses poll intervals and the init descriptor
//! - [`crate::init`]: Uses the host-mode keys and the init descriptor

use std::time::Duration;

// =============================================================================
// Storage Paths
// =============================================================================
//
// One directory per container under the state root:
//
//   <state-root>/<id>/state.json   durable record
//   <state-root>/<id>/start        start marker (created by `start`)
// =============================================================================

/// Default state root when neither `--root` nor `RUNPROC_STATE_DIR` is set.
///
/// `/run` is tmpfs on most distributions, so state does not survive reboot,
/// which matches the lifetime of the managed processes.
pub const DEFAULT_STATE_ROOT: &str = "/run/runproc";

/// Name of the state document inside a container directory.
pub const STATE_FILE: &str = "state.json";

/// Name of the start marker inside a container directory.
pub const START_MARKER_FILE: &str = "start";

/// Name of the OCI runtime config inside a bundle.
pub const BUNDLE_CONFIG_FILE: &str = "config.json";

/// OCI runtime spec version reported by `version`.
pub const OCI_VERSION: &str = "1.0.2";

// =============================================================================
// Environment and Annotations
// =============================================================================

/// Environment variable overriding the state root.
pub const STATE_DIR_ENV: &str = "RUNPROC_STATE_DIR";

/// Environment variable requesting host mode (chroot skipped).
///
/// Honored on the supervisor's own environment and in the target process's
/// declared environment.
pub const HOST_MODE_ENV: &str = "RUNPROC_HOST";

/// Spec annotation requesting host mode.
pub const HOST_MODE_ANNOTATION: &str = "runproc.host";

/// Environment variable holding the `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "RUNPROC_LOG";

// =============================================================================
// Init Handoff
// =============================================================================

/// Descriptor number the init supervisor reads its process message from.
///
/// The controller installs the pipe read-end here before exec; 0-2 are left
/// as the inherited stdio.
pub const INIT_PIPE_FD: i32 = 3;

/// Version of the controller → supervisor message.
///
/// Bumped whenever [`crate::protocol::InitMessage`] changes shape. The
/// supervisor refuses messages with a different version.
pub const INIT_PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Timing
// =============================================================================
//
// Both the start wait and delete's death wait are fixed-interval polls. The
// intervals are defaults for `RuntimeConfig`; callers may override them.
// =============================================================================

/// Interval at which the supervisor checks for the start marker.
///
/// Bounds the latency between `start` returning and the program running.
pub const START_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval at which `delete` re-checks liveness after SIGKILL.
pub const DELETE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `delete` waits for a killed process before removing the record
/// anyway.
pub const DELETE_KILL_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Validation Patterns
// =============================================================================

/// Valid characters for container IDs.
///
/// Includes: `a-z`, `A-Z`, `0-9`, `-`, `_`, `.`
///
/// **Security**: Excludes `/` so an ID can never name anything but a direct
/// child of the state root. A leading `.` is rejected separately.
pub const CONTAINER_ID_VALID_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_.";

/// Maximum container ID length.
///
/// **Rationale**: 128 characters accommodates the 64-hex IDs containerd
/// generates as well as descriptive names.
pub const MAX_CONTAINER_ID_LEN: usize = 128;

// =============================================================================
// Container ID Validation Helper
// =============================================================================

/// Validates a container ID before it is used as a directory name.
///
/// # Security
///
/// This function ensures container IDs:
/// - Are non-empty
/// - Don't exceed `MAX_CONTAINER_ID_LEN`
/// - Only contain characters from `CONTAINER_ID_VALID_CHARS`
/// - Don't start with `.` (rules out `.`, `..` and hidden temp names)
///
/// # Returns
///
/// `Ok(())` if valid, `Err(reason)` with a description of the failure.
#[inline]
#[must_use = "validation result must be checked to ensure container ID is safe"]
pub fn validate_container_id(id: &str) -> std::result::Result<(), &'static str> {
    if id.is_empty() {
        return Err("container ID cannot be empty");
    }
    if id.len() > MAX_CONTAINER_ID_LEN {
        return Err("container ID exceeds maximum length");
    }
    if id.starts_with('.') {
        return Err("container ID cannot start with '.'");
    }
    if !id.chars().all(|c| CONTAINER_ID_VALID_CHARS.contains(c)) {
        return Err("container ID contains invalid characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_container_id() {
        assert!(validate_container_id("abc-123_x.y").is_ok());
        assert!(validate_container_id("").is_err());
        assert!(validate_container_id("..").is_err());
        assert!(validate_container_id(".hidden").is_err());
        assert!(validate_container_id("a/b").is_err());
        assert!(validate_container_id(&"a".repeat(MAX_CONTAINER_ID_LEN + 1)).is_err());
    }
}
