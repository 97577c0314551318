//! Error types for the runtime.

use std::path::PathBuf;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing a container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Container Lifecycle Errors
    // =========================================================================
    /// No state record exists for the container.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// A state record already exists for the container.
    #[error("container already exists: {0}")]
    ContainerAlreadyExists(String),

    /// Container ID failed validation.
    #[error("invalid container ID '{id}': {reason}")]
    InvalidContainerId { id: String, reason: String },

    /// The supervisor process could not be spawned.
    #[error("failed to spawn init for container '{id}': {reason}")]
    SpawnFailed { id: String, reason: String },

    /// Container start failed.
    #[error("failed to start container '{id}': {reason}")]
    StartFailed { id: String, reason: String },

    /// Container is in wrong state for operation.
    #[error("container '{id}' is in state '{state}', expected '{expected}'")]
    InvalidState {
        id: String,
        state: String,
        expected: String,
    },

    /// Signal delivery failed.
    #[error("failed to send signal to container '{id}': {reason}")]
    SignalFailed { id: String, reason: String },

    /// Exit status collection failed.
    #[error("failed to wait for container '{id}': {reason}")]
    WaitFailed { id: String, reason: String },

    // =========================================================================
    // Bundle Errors
    // =========================================================================
    /// Bundle config.json is missing, unreadable or malformed.
    #[error("invalid spec at {path}: {reason}")]
    InvalidSpec { path: PathBuf, reason: String },

    // =========================================================================
    // Supervisor Errors
    // =========================================================================
    /// The supervisor failed before reaching exec.
    #[error("init for container '{id}' failed: {reason}")]
    InitFailed { id: String, reason: String },

    /// Replacing the supervisor image with the target program failed.
    #[error("exec failed in container '{id}': {reason}")]
    ExecFailed { id: String, reason: String },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// State root could not be prepared.
    #[error("failed to initialize state root at {path}: {reason}")]
    StorageInitFailed { path: PathBuf, reason: String },

    /// A state document could not be written.
    #[error("failed to write state for container '{id}': {reason}")]
    StateWriteFailed { id: String, reason: String },

    /// A state document exists but could not be parsed.
    #[error("corrupt state for container '{id}': {reason}")]
    StateCorrupt { id: String, reason: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the error means "no record for this id".
    ///
    /// `kill` and `delete` treat this as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
