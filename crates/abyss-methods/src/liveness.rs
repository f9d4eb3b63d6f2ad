//! Liveness oracle backed by the OS process table

use tracing::debug;

use crate::LivenessOracle;

/// Asks the operating system whether a pid is live.
///
/// Ambiguous answers count as alive: a wrong "dead" would end a run early
/// and report a termination that never happened.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTable;

impl ProcessTable {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous check, usable outside an async context.
    pub fn check(pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        is_process_running(pid)
    }
}

#[async_trait::async_trait]
impl LivenessOracle for ProcessTable {
    async fn is_alive(&self, pid: u32) -> bool {
        Self::check(pid)
    }
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Values past i32::MAX would wrap into negative pids, which address process groups.
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(_) => !is_zombie(pid),
        Err(Errno::ESRCH) => false,
        // Exists, owned by someone else.
        Err(Errno::EPERM) => !is_zombie(pid),
        Err(e) => {
            debug!("liveness: kill({}, 0) returned {}; assuming alive", raw, e);
            true
        }
    }
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
    use std::process::Command;
    match Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
    {
        Ok(o) => {
            let out = String::from_utf8_lossy(&o.stdout);
            if !o.status.success() {
                debug!("liveness: tasklist failed; assuming alive");
                return true;
            }
            !out.contains("INFO:") && out.contains(&pid.to_string())
        }
        Err(e) => {
            debug!("liveness: tasklist unavailable ({}); assuming alive", e);
            true
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn is_process_running(_pid: u32) -> bool {
    false
}

/// A zombie has already exited and only waits for its parent to reap it.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    process_state(&stat) == Some('Z')
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// State letter from a `/proc/<pid>/stat` line. The command name is wrapped in
/// parentheses and may itself contain them, so scan from the last `)`.
#[cfg(any(target_os = "linux", test))]
fn process_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}
