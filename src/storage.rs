//! # Container State Store
//!
//! Durable, crash-consistent storage of one [`ContainerState`] per container.
//!
//! ## Storage Model
//!
//! ```text
//! /run/runproc/
//! ├── web/
//! │   ├── state.json      (record)
//! │   └── start           (start marker, after `start`)
//! └── batch-7/
//!     └── state.json
//! ```
//!
//! ## Atomic Writes
//!
//! The controller writes while external pollers (and the init supervisor)
//! read from other processes, with no shared memory and no locks. Every
//! write therefore goes through a uniquely named temp file:
//!
//! - [`StateStore::save`]: temp file → fsync → `rename` over `state.json`
//! - [`StateStore::create`]: temp file → fsync → `link` to `state.json`
//!
//! `link` fails with `EEXIST` if the document is already there, which makes
//! `create` an exclusive create: two concurrent creates for the same ID
//! cannot both succeed.
//!
//! Readers therefore see either the old document or the new one, never a
//! partial one.
//!
//! ## Path Safety
//!
//! IDs are validated with [`validate_container_id`] before they are joined
//! onto the state root.

use crate::constants::{START_MARKER_FILE, STATE_FILE, validate_container_id};
use crate::error::{Error, Result};
use crate::state::{ContainerState, ContainerStatus};
use chrono::Utc;
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filesystem-backed container state store.
///
/// ## Thread Safety
///
/// `StateStore` holds only a path; every operation goes straight to the
/// filesystem and is safe to call from several processes at once.
#[derive(Debug, Clone)]
pub struct StateStore {
    /// Root directory holding one subdirectory per container.
    root: PathBuf,
}

impl StateStore {
    /// Opens (and creates, mode 0700) a state store at `root`.
    pub fn with_path(root: PathBuf) -> Result<Self> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&root)
            .map_err(|e| Error::StorageInitFailed {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        debug!("State store at {}", root.display());
        Ok(Self { root })
    }

    /// Returns the state root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory for a container.
    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Returns the state document path for a container.
    pub fn state_path(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(STATE_FILE)
    }

    /// Returns the start marker path for a container.
    pub fn start_marker_path(&self, id: &str) -> PathBuf {
        self.container_dir(id).join(START_MARKER_FILE)
    }

    /// Checks whether a record exists.
    pub fn exists(&self, id: &str) -> bool {
        validate_container_id(id).is_ok() && self.state_path(id).exists()
    }

    /// Creates the record for a new container.
    ///
    /// The record is stamped `created` with the current time regardless of
    /// what the caller passed in.
    ///
    /// # Errors
    ///
    /// [`Error::ContainerAlreadyExists`] if a record for the ID is present.
    pub fn create(&self, state: &mut ContainerState) -> Result<()> {
        Self::check_id(&state.id)?;

        let dir = self.container_dir(&state.id);
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&dir)
            .map_err(|e| Error::StateWriteFailed {
                id: state.id.clone(),
                reason: format!("create {}: {}", dir.display(), e),
            })?;

        state.status = ContainerStatus::Created;
        state.created_at = Utc::now();

        let path = self.state_path(&state.id);
        let temp = self.write_temp(state)?;

        let linked = fs::hard_link(&temp, &path);
        let _ = fs::remove_file(&temp);
        match linked {
            Ok(()) => {
                info!("Created state for container {}", state.id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(Error::ContainerAlreadyExists(state.id.clone()))
            }
            Err(e) => Err(Error::StateWriteFailed {
                id: state.id.clone(),
                reason: format!("publish {}: {}", path.display(), e),
            }),
        }
    }

    /// Loads the record for a container.
    pub fn load(&self, id: &str) -> Result<ContainerState> {
        Self::check_id(id)?;

        let path = self.state_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ContainerNotFound(id.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        serde_json::from_str(&content).map_err(|e| Error::StateCorrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Overwrites an existing record atomically.
    pub fn save(&self, state: &ContainerState) -> Result<()> {
        Self::check_id(&state.id)?;

        let path = self.state_path(&state.id);
        let temp = self.write_temp(state)?;

        fs::rename(&temp, &path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::StateWriteFailed {
                id: state.id.clone(),
                reason: format!("rename to {}: {}", path.display(), e),
            }
        })?;

        debug!("Saved state for container {} ({})", state.id, state.status);
        Ok(())
    }

    /// Removes a container's directory tree. Missing records are not an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        Self::check_id(id)?;

        let dir = self.container_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Deleted state for container {}", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Creates the start marker that releases the init supervisor.
    pub fn mark_started(&self, id: &str) -> Result<()> {
        Self::check_id(id)?;

        let marker = self.start_marker_path(id);
        fs::write(&marker, b"start").map_err(|e| Error::StartFailed {
            id: id.to_string(),
            reason: format!("write {}: {}", marker.display(), e),
        })
    }

    /// Checks whether the start marker exists.
    pub fn is_started(&self, id: &str) -> bool {
        validate_container_id(id).is_ok() && self.start_marker_path(id).exists()
    }

    /// Loads every readable record, sorted by ID.
    ///
    /// Directories without a parseable record are skipped with a warning.
    pub fn list(&self) -> Result<Vec<ContainerState>> {
        let mut states = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.load(&id) {
                Ok(state) => states.push(state),
                Err(Error::ContainerNotFound(_)) => {}
                Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    /// Serializes `state` into a fresh temp file beside `state.json`.
    fn write_temp(&self, state: &ContainerState) -> Result<PathBuf> {
        let content = serde_json::to_vec_pretty(state)?;
        let temp = self
            .container_dir(&state.id)
            .join(format!("{}.tmp.{}", STATE_FILE, uuid::Uuid::now_v7()));

        let write = || -> std::io::Result<()> {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&temp)?;
            file.write_all(&content)?;
            file.write_all(b"\n")?;
            file.sync_all()
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&temp);
            match e.kind() {
                ErrorKind::NotFound => Error::ContainerNotFound(state.id.clone()),
                _ => Error::StateWriteFailed {
                    id: state.id.clone(),
                    reason: format!("write {}: {}", temp.display(), e),
                },
            }
        })?;

        Ok(temp)
    }

    fn check_id(id: &str) -> Result<()> {
        validate_container_id(id).map_err(|reason| Error::InvalidContainerId {
            id: id.to_string(),
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::with_path(temp.path().to_path_buf()).unwrap();

        let mut state = ContainerState::new("c1", "/bundle", 1234);
        store.create(&mut state).unwrap();
        assert!(store.exists("c1"));

        let loaded = store.load("c1").unwrap();
        assert_eq!(loaded, state);

        store.delete("c1").unwrap();
        assert!(!store.exists("c1"));
        assert!(!store.container_dir("c1").exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::with_path(temp.path().to_path_buf()).unwrap();

        let mut state = ContainerState::new("c1", "/bundle", 1);
        store.create(&mut state).unwrap();
        state.mark_running().unwrap();
        store.save(&state).unwrap();

        let names: Vec<String> = fs::read_dir(store.container_dir("c1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![STATE_FILE.to_string()]);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::with_path(temp.path().to_path_buf()).unwrap();

        let err = store.load("../escape").unwrap_err();
        assert!(matches!(err, Error::InvalidContainerId { .. }));
        assert!(!store.exists("../escape"));
    }
}
