//! Container state record.
//!
//! The durable JSON document kept per container. It is the only thing the
//! controller, the init supervisor and any external poller share, so its
//! shape is part of the runtime's external interface:
//!
//! ```json
//! {
//!   "id": "web",
//!   "bundle": "/var/lib/bundles/web",
//!   "pid": 4242,
//!   "status": "running",
//!   "createdAt": "2026-01-01T00:00:00.000000000Z",
//!   "startedAt": "2026-01-01T00:00:01.000000000Z"
//! }
//! ```
//!
//! # Status Transitions
//!
//! ```text
//!   ┌─────────┐   start   ┌─────────┐  exit / self-heal  ┌─────────┐
//!   │ Created │ ────────► │ Running │ ─────────────────► │ Stopped │
//!   └────┬────┘           └─────────┘                    └─────────┘
//!        │                                                    ▲
//!        └──────────────── died before start ─────────────────┘
//! ```
//!
//! `Stopped` is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

// =============================================================================
// Container Status
// =============================================================================

/// Lifecycle status of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Supervisor spawned and blocked waiting for `start`.
    Created,
    /// Start signalled; the supervisor has exec'd or is about to.
    Running,
    /// The managed process is gone.
    Stopped,
}

impl ContainerStatus {
    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// Status only ever moves forward; staying put is not a transition.
    pub fn can_transition_to(self, next: ContainerStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Created, Self::Stopped)
                | (Self::Running, Self::Stopped)
        )
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// =============================================================================
// Container State
// =============================================================================

/// Durable per-container record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerState {
    /// Container ID. Immutable.
    pub id: String,
    /// Absolute path to the bundle directory.
    pub bundle: String,
    /// PID of the supervisor, which becomes the managed program.
    pub pid: i32,
    /// Lifecycle status.
    pub status: ContainerStatus,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When `start` was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the process was observed or reaped as exited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    /// Exit code, known only when the controller reaped the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Annotations copied from the spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
    /// Where the pid was written, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<String>,
}

impl ContainerState {
    /// Creates a new record in the `created` status.
    pub fn new(id: impl Into<String>, bundle: impl Into<String>, pid: i32) -> Self {
        Self {
            id: id.into(),
            bundle: bundle.into(),
            pid,
            status: ContainerStatus::Created,
            created_at: Utc::now(),
            started_at: None,
            exited_at: None,
            exit_code: None,
            annotations: None,
            pid_file: None,
        }
    }

    /// Returns true if the container is running.
    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }

    /// Returns true if the container has stopped.
    pub fn is_stopped(&self) -> bool {
        self.status == ContainerStatus::Stopped
    }

    /// Moves the record to `running` and stamps `startedAt`.
    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(ContainerStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Moves the record to `stopped` and stamps `exitedAt`.
    ///
    /// `exit_code` is `None` when the process was only observed dead, not
    /// reaped.
    pub fn mark_stopped(&mut self, exit_code: Option<i32>) -> Result<()> {
        self.transition(ContainerStatus::Stopped)?;
        self.exited_at = Some(Utc::now());
        self.exit_code = exit_code;
        Ok(())
    }

    fn transition(&mut self, next: ContainerStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidState {
                id: self.id.clone(),
                state: self.status.to_string(),
                expected: match next {
                    ContainerStatus::Created => "none".to_string(),
                    ContainerStatus::Running => ContainerStatus::Created.to_string(),
                    ContainerStatus::Stopped => "created or running".to_string(),
                },
            });
        }
        self.status = next;
        Ok(())
    }
}

// =============================================================================
// State View
// =============================================================================

/// Read-only projection printed by the `state` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub id: String,
    pub pid: i32,
    pub status: ContainerStatus,
    pub bundle: String,
}

impl From<&ContainerState> for StateView {
    fn from(state: &ContainerState) -> Self {
        Self {
            id: state.id.clone(),
            pid: state.pid,
            status: state.status,
            bundle: state.bundle.clone(),
        }
    }
}
