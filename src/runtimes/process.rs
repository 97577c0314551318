//! # Process Runtime - Lifecycle Controller
//!
//! Implements the [`OciRuntime`] trait by running the container's program as
//! an ordinary host process. There are no namespaces or cgroups; the only
//! isolation is an optional `chroot` performed by the init supervisor.
//!
//! ## Create Protocol
//!
//! ```text
//!  controller (create)                         init supervisor
//!  ───────────────────                         ───────────────
//!  load spec, validate id
//!  pipe2(O_CLOEXEC) → (R, W)
//!  spawn `<init> init <root> <id>` ──────────▶ R installed as fd 3
//!  close R                                     blocks reading fd 3
//!  write state.json (created, pid)
//!  write pid file (optional)
//!  write InitMessage to W, close W ──────────▶ EOF: message complete
//!  return                                      polls for start marker
//!
//!  controller (start)
//!  ───────────────────
//!  write start marker ───────────────────────▶ reload state + spec
//!  state.json → running                        chroot / chdir / execve
//! ```
//!
//! `create` returns only once the process exists and owns its full
//! description, so the PID in state is final and a later `start` from a
//! different invocation has nothing to hand over.
//!
//! ## Failure Cleanup
//!
//! | Step fails            | Child          | Record    |
//! |-----------------------|----------------|-----------|
//! | spawn                 | none           | none      |
//! | state create          | killed, reaped | untouched |
//! | pid file / pipe write | killed, reaped | deleted   |
//!
//! ## Self-Healing
//!
//! Nothing reaps the program when the invoking command has already exited,
//! so a record can claim `created` or `running` after the process died.
//! Every read ([`OciRuntime::state`], [`ProcessRuntime::list`]) checks the
//! PID and rewrites such a record as `stopped` with no exit code.

use crate::config::RuntimeConfig;
use crate::constants::{INIT_PIPE_FD, validate_container_id};
use crate::error::{Error, Result};
use crate::process::{pid_alive, send_signal, wait_exit_code};
use crate::protocol;
use crate::runtime::{OciRuntime, Signal};
use crate::spec::load_spec;
use crate::state::{ContainerState, ContainerStatus};
use crate::storage::StateStore;
use async_trait::async_trait;
use nix::fcntl::OFlag;
use std::fs::{self, File};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, warn};

/// OCI runtime that runs the container as a plain host process.
///
/// ## Thread Safety
///
/// Holds only configuration and a [`StateStore`]; all state lives on disk so
/// separate invocations (and separate processes) share it safely.
#[derive(Debug, Clone)]
pub struct ProcessRuntime {
    config: RuntimeConfig,
    store: StateStore,
}

impl ProcessRuntime {
    /// Creates a runtime, preparing the state root.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let store = StateStore::with_path(config.state_root.clone())?;
        Ok(Self { config, store })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Returns the state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Creates a container, optionally writing its PID to `pid_file`.
    ///
    /// Returns the PID of the blocked supervisor.
    pub async fn create_with_pid_file(
        &self,
        id: &str,
        bundle: &Path,
        pid_file: Option<&Path>,
    ) -> Result<i32> {
        validate_container_id(id).map_err(|reason| Error::InvalidContainerId {
            id: id.to_string(),
            reason: reason.to_string(),
        })?;

        let spec = load_spec(bundle)?;
        let bundle = fs::canonicalize(bundle).unwrap_or_else(|_| bundle.to_path_buf());

        if self.store.exists(id) {
            return Err(Error::ContainerAlreadyExists(id.to_string()));
        }

        let (mut child, writer) = self.spawn_init(id, &bundle)?;
        let pid = child.id() as i32;
        debug!("Spawned init for {} as pid {}", id, pid);

        let mut state = ContainerState::new(id, bundle.to_string_lossy(), pid);
        if !spec.annotations.is_empty() {
            state.annotations = Some(spec.annotations.clone());
        }
        state.pid_file = pid_file.map(|p| p.to_string_lossy().into_owned());

        if let Err(e) = self.store.create(&mut state) {
            abort_child(&mut child);
            return Err(e);
        }

        if let Some(path) = pid_file
            && let Err(e) = write_pid_file(path, pid)
        {
            abort_child(&mut child);
            let _ = self.store.delete(id);
            return Err(Error::StateWriteFailed {
                id: id.to_string(),
                reason: format!("pid file {}: {}", path.display(), e),
            });
        }

        // Closing the writer (dropped at the end of the call) is what
        // completes the message for the supervisor.
        if let Err(e) = protocol::write_message(writer, &spec.process) {
            abort_child(&mut child);
            let _ = self.store.delete(id);
            return Err(Error::SpawnFailed {
                id: id.to_string(),
                reason: format!("send process to init: {}", e),
            });
        }

        info!("Created container {} (pid {})", id, pid);
        Ok(pid)
    }

    /// Creates, starts, and waits for a container; returns its exit code.
    ///
    /// A container that fails to start is deleted before the error is
    /// returned.
    pub async fn run(&self, id: &str, bundle: &Path, pid_file: Option<&Path>) -> Result<i32> {
        self.create_with_pid_file(id, bundle, pid_file).await?;

        if let Err(e) = self.start(id).await {
            if let Err(cleanup) = self.delete(id).await {
                warn!("Cleanup of {} after failed start: {}", id, cleanup);
            }
            return Err(e);
        }

        self.wait(id).await
    }

    /// Lists every container, self-healing stale records.
    pub async fn list(&self) -> Result<Vec<ContainerState>> {
        let mut states = self.store.list()?;
        for state in &mut states {
            self.refresh(state);
        }
        Ok(states)
    }

    /// Spawns the init supervisor with the pipe read-end installed at
    /// [`INIT_PIPE_FD`]. Returns the child and the pipe write-end.
    fn spawn_init(&self, id: &str, bundle: &Path) -> Result<(Child, File)> {
        let spawn_err = |reason: String| Error::SpawnFailed {
            id: id.to_string(),
            reason,
        };

        let (read_end, write_end) =
            nix::unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| spawn_err(format!("pipe: {}", e)))?;
        let read_fd = read_end.as_raw_fd();

        let mut command = Command::new(&self.config.init_binary);
        command
            .arg("init")
            .arg("--poll-interval-ms")
            .arg(self.config.start_poll_interval.as_millis().to_string())
            .arg(&self.config.state_root)
            .arg(id)
            .current_dir(bundle)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // SAFETY: the hook only calls dup2/fcntl, which are async-signal-safe.
        unsafe {
            command.pre_exec(move || install_init_pipe(read_fd));
        }

        let child = command.spawn().map_err(|e| {
            spawn_err(format!("{}: {}", self.config.init_binary.display(), e))
        })?;

        drop(read_end);
        Ok((child, File::from(write_end)))
    }

    /// Rewrites a record whose process is gone as `stopped`.
    ///
    /// Returns true if the record changed. A failed save is logged; the
    /// caller still sees the corrected status.
    fn refresh(&self, state: &mut ContainerState) -> bool {
        if state.is_stopped() || pid_alive(state.pid) {
            return false;
        }

        debug!(
            "Container {} is {} but pid {} is gone",
            state.id, state.status, state.pid
        );
        if state.mark_stopped(None).is_err() {
            return false;
        }
        if let Err(e) = self.store.save(state) {
            warn!("Failed to persist stopped state for {}: {}", state.id, e);
        }
        true
    }

    /// Loads a record, treating "not found" as `None`.
    ///
    /// An id that could never name a container is not found either.
    fn load_optional(&self, id: &str) -> Result<Option<ContainerState>> {
        match self.store.load(id) {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(Error::InvalidContainerId { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl OciRuntime for ProcessRuntime {
    fn name(&self) -> &str {
        "process"
    }

    async fn create(&self, id: &str, bundle: &Path) -> Result<()> {
        self.create_with_pid_file(id, bundle, None).await.map(|_| ())
    }

    async fn start(&self, id: &str) -> Result<()> {
        let mut state = self.store.load(id)?;

        match state.status {
            ContainerStatus::Created => {}
            ContainerStatus::Running => {
                debug!("Container {} already running", id);
                return Ok(());
            }
            ContainerStatus::Stopped => {
                return Err(Error::InvalidState {
                    id: id.to_string(),
                    state: state.status.to_string(),
                    expected: ContainerStatus::Created.to_string(),
                });
            }
        }

        self.store.mark_started(id)?;
        state.mark_running()?;
        self.store.save(&state)?;

        info!("Started container {}", id);
        Ok(())
    }

    async fn state(&self, id: &str) -> Result<ContainerState> {
        let mut state = self.store.load(id)?;
        self.refresh(&mut state);
        Ok(state)
    }

    async fn kill(&self, id: &str, signal: Signal) -> Result<()> {
        let Some(state) = self.load_optional(id)? else {
            debug!("Kill of unknown container {} ignored", id);
            return Ok(());
        };

        if state.is_stopped() {
            return Err(Error::InvalidState {
                id: id.to_string(),
                state: state.status.to_string(),
                expected: "created or running".to_string(),
            });
        }

        send_signal(state.pid, signal.as_i32()).map_err(|e| Error::SignalFailed {
            id: id.to_string(),
            reason: format!("{} to pid {}: {}", signal, state.pid, e),
        })?;

        info!("Sent {} to container {}", signal, id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let Some(mut state) = self.load_optional(id)? else {
            debug!("Delete of unknown container {} ignored", id);
            return Ok(());
        };

        if !state.is_stopped() && pid_alive(state.pid) {
            if let Err(e) = send_signal(state.pid, Signal::Kill.as_i32()) {
                warn!("SIGKILL to {} (pid {}): {}", id, state.pid, e);
            }

            let deadline = Instant::now() + self.config.delete_timeout;
            loop {
                if self.refresh(&mut state) {
                    break;
                }
                if Instant::now() >= deadline {
                    warn!(
                        "Container {} (pid {}) still alive after {:?}, removing record anyway",
                        id, state.pid, self.config.delete_timeout
                    );
                    break;
                }
                tokio::time::sleep(self.config.delete_poll_interval).await;
            }
        }

        self.store.delete(id)?;
        info!("Deleted container {}", id);
        Ok(())
    }

    async fn wait(&self, id: &str) -> Result<i32> {
        let pid = self.store.load(id)?.pid;

        let exit_code = tokio::task::spawn_blocking(move || wait_exit_code(pid))
            .await
            .map_err(|e| Error::Internal(format!("wait task: {}", e)))?
            .map_err(|e| Error::WaitFailed {
                id: id.to_string(),
                reason: format!("pid {}: {}", pid, e),
            })?;

        let Some(mut state) = self.load_optional(id)? else {
            debug!("Container {} removed while waiting", id);
            return Ok(exit_code);
        };
        if state.is_stopped() {
            state.exit_code = Some(exit_code);
        } else {
            state.mark_stopped(Some(exit_code))?;
        }
        self.store.save(&state)?;

        info!("Container {} exited with code {}", id, exit_code);
        Ok(exit_code)
    }
}

/// Installs the pipe read-end at [`INIT_PIPE_FD`] in the forked child.
///
/// `dup2` yields a descriptor without close-on-exec. If the read-end already
/// sits at that number the flag is cleared in place instead.
fn install_init_pipe(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl/dup2 on descriptors owned by this (forked) process.
    unsafe {
        if fd == INIT_PIPE_FD {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                return Err(io::Error::last_os_error());
            }
        } else if libc::dup2(fd, INIT_PIPE_FD) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Writes `pid` to `path` atomically (temp file + rename).
fn write_pid_file(path: &Path, pid: i32) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pid".to_string());
    let temp = path.with_file_name(format!(".{}.{}", file_name, uuid::Uuid::now_v7()));

    fs::write(&temp, pid.to_string())?;
    fs::rename(&temp, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp);
    })
}

/// Kills and reaps a supervisor that will not be handed its process.
fn abort_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("Kill of aborted init {}: {}", child.id(), e);
    }
    let _ = child.wait();
}
