//! Process primitives: liveness, signal delivery and exit-status collection.
//!
//! Thin wrappers over `kill(2)` and `waitpid(2)`. PIDs are plain `i32`
//! because that is what the state record stores and what the kernel takes.

use std::io;
use tracing::debug;

/// Returns true if `pid` names a live process.
///
/// `kill(pid, 0)` succeeding, or failing with `EPERM` (exists but owned by
/// someone else), means the PID exists. On Linux a zombie (exited but not
/// yet reaped) is reported as dead: it will never run again.
pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }

    // SAFETY: signal 0 performs only the existence and permission check.
    let ret = unsafe { libc::kill(pid, 0) };
    let exists = ret == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);

    exists && !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: i32) -> bool {
    // Format: "<pid> (<comm>) <state> ...". comm may itself contain ") ",
    // so split at the last one.
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    stat.rsplit_once(") ")
        .and_then(|(_, rest)| rest.chars().next())
        .is_some_and(|state| state == 'Z' || state == 'X')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: i32) -> bool {
    false
}

/// Delivers signal number `signal` to `pid`.
pub fn send_signal(pid: i32, signal: i32) -> io::Result<()> {
    if pid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {}", pid),
        ));
    }

    // SAFETY: kill() has no memory-safety preconditions; pid > 0 keeps it
    // from addressing a process group.
    let ret = unsafe { libc::kill(pid, signal) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    debug!("Sent signal {} to pid {}", signal, pid);
    Ok(())
}

/// Blocks until child `pid` exits and returns its exit code.
///
/// Normal exit yields the exit status; death by signal yields
/// `128 + signal` (shell convention). `EINTR` is retried. Only the parent
/// of `pid` can collect its status; anyone else gets `ECHILD`.
pub fn wait_exit_code(pid: i32) -> io::Result<i32> {
    if pid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to wait for pid {}", pid),
        ));
    }

    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: status is a valid out-pointer for the duration of the call.
        let ret = unsafe { libc::waitpid(pid, &mut status, 0) };

        if ret == pid {
            if libc::WIFEXITED(status) {
                return Ok(libc::WEXITSTATUS(status));
            }
            if libc::WIFSIGNALED(status) {
                return Ok(128 + libc::WTERMSIG(status));
            }
            // Stopped/continued notifications are not requested, but be
            // conservative and keep waiting.
            continue;
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Returns true if running with effective UID 0.
pub fn is_superuser() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_non_positive_pid_is_dead() {
        assert!(!pid_alive(0));
        assert!(!pid_alive(-1));
        assert!(send_signal(0, libc::SIGTERM).is_err());
    }

    #[test]
    fn test_own_process_is_alive() {
        assert!(pid_alive(std::process::id() as i32));
    }

    #[test]
    fn test_wait_exit_code() {
        let child = Command::new("/bin/sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let code = wait_exit_code(child.id() as i32).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn test_wait_signaled_exit_code() {
        let child = Command::new("/bin/sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        send_signal(pid, libc::SIGKILL).unwrap();
        assert_eq!(wait_exit_code(pid).unwrap(), 128 + libc::SIGKILL);
    }

    #[test]
    fn test_reaped_pid_is_dead() {
        let mut child = Command::new("/bin/true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        assert!(!pid_alive(pid));
    }
}
