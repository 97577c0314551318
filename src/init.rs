//! # Init Supervisor
//!
//! The code that runs inside the process `create` spawns. It is reached
//! through the internal `runproc init <state-root> <id>` command and ends by
//! replacing itself with the container's program, so the PID recorded at
//! create time is the PID of the program for its whole life.
//!
//! ## Sequence
//!
//! ```text
//!  read InitMessage from fd 3 (blocks until the controller closes it)
//!          │
//!          ▼
//!  poll <state-root>/<id>/start every poll interval
//!          │
//!          ▼
//!  reload state (bundle) and spec (root, annotations)
//!          │
//!          ▼
//!  chroot(root) + chdir("/")   unless host mode, no root, or not euid 0
//!          │
//!          ▼
//!  chdir(cwd), build env, execve(args[0], args, env)
//! ```
//!
//! The supervisor never writes state. If exec fails it exits non-zero and the
//! record stays `running` until a reader notices the PID is gone.
//!
//! ## Host Mode
//!
//! Host mode skips the chroot so the program sees the node's filesystem. It
//! is on if any of these is truthy (`1`, `true`, `yes`, any case):
//!
//! | Source                                   | Key            |
//! |------------------------------------------|----------------|
//! | supervisor's own environment             | `RUNPROC_HOST` |
//! | the bundle's `process.env`               | `RUNPROC_HOST` |
//! | the bundle's annotations                 | `runproc.host` |
//!
//! No source can switch it off once another has switched it on.

use crate::constants::{HOST_MODE_ANNOTATION, HOST_MODE_ENV, INIT_PIPE_FD};
use crate::error::{Error, Result};
use crate::process::is_superuser;
use crate::protocol;
use crate::spec::{Process, Spec, load_spec};
use crate::storage::StateStore;
use nix::sys::signal::{SigHandler, Signal as NixSignal, signal};
use std::convert::Infallible;
use std::ffi::CString;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Inputs to the supervisor, assembled by the command-line adapter.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// State root the controller used.
    pub state_root: PathBuf,
    /// Container ID.
    pub id: String,
    /// Start-marker poll interval.
    pub poll_interval: Duration,
    /// Whether the supervisor's own environment requested host mode.
    pub host_mode_env: bool,
}

/// Runs the supervisor. Returns only on failure.
pub fn run(opts: &InitOptions) -> Result<Infallible> {
    // SAFETY: the controller installed the pipe read-end at INIT_PIPE_FD
    // before exec; nothing else in this process owns that descriptor.
    let pipe = unsafe { File::from_raw_fd(INIT_PIPE_FD) };
    let process = protocol::read_message(pipe).map_err(|e| Error::InitFailed {
        id: opts.id.clone(),
        reason: format!("decode process: {}", e),
    })?;
    debug!("Init {} received {} args", opts.id, process.args.len());

    let store = StateStore::with_path(opts.state_root.clone())?;
    wait_for_start(&store, &opts.id, opts.poll_interval)?;

    let state = store.load(&opts.id)?;
    let bundle = PathBuf::from(&state.bundle);
    let spec = load_spec(&bundle)?;

    let host_mode = host_mode_requested(opts.host_mode_env, &process, &spec);
    enter_root(&opts.id, &spec, &bundle, host_mode)?;

    if !process.cwd.is_empty() {
        nix::unistd::chdir(Path::new(&process.cwd)).map_err(|e| Error::InitFailed {
            id: opts.id.clone(),
            reason: format!("chdir {}: {}", process.cwd, e),
        })?;
    }

    if process.terminal {
        debug!("Terminal requested for {}; using inherited stdio", opts.id);
    }

    exec(&opts.id, &process)
}

/// Blocks until the start marker for `id` exists.
///
/// Fails if the container's directory disappears while waiting (the record
/// was deleted before start), rather than polling forever.
pub fn wait_for_start(store: &StateStore, id: &str, poll_interval: Duration) -> Result<()> {
    loop {
        if store.is_started(id) {
            info!("Start signal received for {}", id);
            return Ok(());
        }
        if !store.container_dir(id).exists() {
            return Err(Error::ContainerNotFound(id.to_string()));
        }
        std::thread::sleep(poll_interval);
    }
}

/// Returns true for `1`, `true`, or `yes` (any case).
pub fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

/// ORs the three host-mode sources.
pub fn host_mode_requested(host_mode_env: bool, process: &Process, spec: &Spec) -> bool {
    host_mode_env
        || process.env_var(HOST_MODE_ENV).is_some_and(is_truthy)
        || spec.annotation(HOST_MODE_ANNOTATION).is_some_and(is_truthy)
}

/// Whether the supervisor changes root into a declared root filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootEntry {
    Enter,
    SkipHostMode,
    SkipUnprivileged,
}

/// Host mode wins over privilege; without privilege chroot is skipped.
pub fn root_entry(host_mode: bool, superuser: bool) -> RootEntry {
    if host_mode {
        RootEntry::SkipHostMode
    } else if superuser {
        RootEntry::Enter
    } else {
        RootEntry::SkipUnprivileged
    }
}

/// Changes root into the spec's root filesystem when policy allows.
///
/// Skipped silently in host mode, without a declared root, or without
/// superuser privilege.
fn enter_root(id: &str, spec: &Spec, bundle: &Path, host_mode: bool) -> Result<()> {
    let Some(rootfs) = spec.root_path(bundle) else {
        return Ok(());
    };
    match root_entry(host_mode, is_superuser()) {
        RootEntry::Enter => {}
        RootEntry::SkipHostMode => {
            info!("Host mode for {}: not entering {}", id, rootfs.display());
            return Ok(());
        }
        RootEntry::SkipUnprivileged => {
            debug!("Not root: not entering {}", rootfs.display());
            return Ok(());
        }
    }

    nix::unistd::chroot(&rootfs).map_err(|e| Error::InitFailed {
        id: id.to_string(),
        reason: format!("chroot {}: {}", rootfs.display(), e),
    })?;
    nix::unistd::chdir("/").map_err(|e| Error::InitFailed {
        id: id.to_string(),
        reason: format!("chdir after chroot: {}", e),
    })?;

    debug!("Entered root {} for {}", rootfs.display(), id);
    Ok(())
}

/// Builds the program's environment.
///
/// A declared environment replaces the inherited one wholesale (entries
/// without `=` are dropped); an empty declaration inherits.
pub fn build_env(process: &Process) -> Vec<Vec<u8>> {
    if process.env.is_empty() {
        return std::env::vars_os()
            .map(|(k, v)| {
                let mut entry = k.as_bytes().to_vec();
                entry.push(b'=');
                entry.extend_from_slice(v.as_bytes());
                entry
            })
            .collect();
    }

    process
        .env
        .iter()
        .filter(|entry| entry.contains('='))
        .map(|entry| entry.as_bytes().to_vec())
        .collect()
}

/// Replaces this process with the target program.
fn exec(id: &str, process: &Process) -> Result<Infallible> {
    let exec_err = |reason: String| Error::ExecFailed {
        id: id.to_string(),
        reason,
    };

    let args = process
        .args
        .iter()
        .map(|a| CString::new(a.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| exec_err(format!("argument contains NUL: {}", e)))?;
    let env = build_env(process)
        .into_iter()
        .map(CString::new)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| exec_err(format!("environment contains NUL: {}", e)))?;

    let program = args
        .first()
        .ok_or_else(|| exec_err("empty argument vector".to_string()))?;

    // The Rust runtime ignores SIGPIPE and an ignored disposition survives
    // execve.
    // SAFETY: restoring the default handler installs no Rust code.
    unsafe { signal(NixSignal::SIGPIPE, SigHandler::SigDfl) }
        .map_err(|e| exec_err(format!("reset SIGPIPE: {}", e)))?;

    info!("Exec {} for container {}", process.args[0], id);
    match nix::unistd::execve(program, &args, &env) {
        Ok(never) => match never {},
        Err(errno) => Err(exec_err(format!("{}: {}", process.args[0], errno))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Root;
    use std::collections::HashMap;

    fn spec_with(annotations: &[(&str, &str)]) -> Spec {
        Spec {
            oci_version: "1.1.0".to_string(),
            process: Process {
                args: vec!["/bin/true".to_string()],
                ..Default::default()
            },
            root: Some(Root {
                path: "rootfs".to_string(),
                readonly: false,
            }),
            annotations: annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    fn process_with_env(env: &[&str]) -> Process {
        Process {
            args: vec!["/bin/true".to_string()],
            env: env.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_truthy_values() {
        for v in ["1", "true", "TRUE", "True", "yes", "YES"] {
            assert!(is_truthy(v), "{} should be truthy", v);
        }
        for v in ["", "0", "false", "no", "on", "2", " yes"] {
            assert!(!is_truthy(v), "{} should not be truthy", v);
        }
    }

    #[test]
    fn test_host_mode_any_source() {
        let plain = spec_with(&[]);
        let no_env = process_with_env(&[]);

        assert!(!host_mode_requested(false, &no_env, &plain));
        assert!(host_mode_requested(true, &no_env, &plain));
        assert!(host_mode_requested(
            false,
            &process_with_env(&["RUNPROC_HOST=yes"]),
            &plain
        ));
        assert!(host_mode_requested(
            false,
            &no_env,
            &spec_with(&[(HOST_MODE_ANNOTATION, "true")])
        ));
    }

    #[test]
    fn test_host_mode_cannot_be_disabled() {
        let spec = spec_with(&[(HOST_MODE_ANNOTATION, "false")]);
        let process = process_with_env(&["RUNPROC_HOST=0"]);
        assert!(host_mode_requested(true, &process, &spec));

        let spec = spec_with(&[(HOST_MODE_ANNOTATION, "1")]);
        assert!(host_mode_requested(false, &process, &spec));
    }

    #[test]
    fn test_host_mode_skips_root_even_as_superuser() {
        assert_eq!(root_entry(true, true), RootEntry::SkipHostMode);
        assert_eq!(root_entry(true, false), RootEntry::SkipHostMode);
        assert_eq!(root_entry(false, true), RootEntry::Enter);
        assert_eq!(root_entry(false, false), RootEntry::SkipUnprivileged);
    }

    #[test]
    fn test_declared_env_replaces_inherited() {
        let process = process_with_env(&["A=1", "BROKEN", "B=2"]);
        let env = build_env(&process);
        assert_eq!(env, vec![b"A=1".to_vec(), b"B=2".to_vec()]);
    }

    #[test]
    fn test_empty_env_inherits() {
        let env = build_env(&process_with_env(&[]));
        assert_eq!(env.len(), std::env::vars_os().count());
    }

    #[test]
    fn test_wait_for_start_fails_when_record_removed() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = StateStore::with_path(temp.path().to_path_buf()).unwrap();

        let err = wait_for_start(&store, "gone", Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound(_)));
    }

    #[test]
    fn test_wait_for_start_returns_once_marked() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = StateStore::with_path(temp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(store.container_dir("c1")).unwrap();
        store.mark_started("c1").unwrap();

        wait_for_start(&store, "c1", Duration::from_millis(1)).unwrap();
    }
}
