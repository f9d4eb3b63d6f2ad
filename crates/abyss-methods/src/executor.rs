//! Method executor: runs one script against a target with a hard timeout

use abyss_core::{AbyssConfig, ExecutionFailure, ExecutionOutcome, MethodDescriptor};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::MethodRunner;

pub struct ScriptExecutor {
    timeout: Duration,
    interpreter: Option<String>,
}

impl ScriptExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interpreter: None,
        }
    }

    /// Run scripts through `interpreter` instead of executing them directly.
    pub fn with_interpreter(mut self, interpreter: Option<String>) -> Self {
        self.interpreter = interpreter.filter(|i| !i.trim().is_empty());
        self
    }

    pub fn from_config(config: &AbyssConfig) -> Self {
        Self::new(config.method_timeout()).with_interpreter(config.methods.interpreter.clone())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, method: &MethodDescriptor, target: u32) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut c = Command::new(interpreter);
                c.arg(&method.path);
                c
            }
            None => Command::new(&method.path),
        };
        cmd.arg(target.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down anything the script started.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[async_trait::async_trait]
impl MethodRunner for ScriptExecutor {
    async fn execute(&self, method: &MethodDescriptor, target: u32) -> ExecutionOutcome {
        debug!("execute: {} against {}", method, target);
        let started = Instant::now();

        let child = match self.command(method, target).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to launch {}: {}", method.file_name(), e);
                return ExecutionOutcome::failed(
                    ExecutionFailure::Launch { reason: e.to_string() },
                    elapsed_ms(started),
                );
            }
        };
        let pid = child.id();

        // wait_with_output drains both pipes while waiting, so chatty scripts can't
        // block on a full pipe. On timeout the child is dropped with the future
        // and kill_on_drop sends it SIGKILL; the group kill covers its descendants.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ExecutionOutcome::completed(
                output.status.code(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
                elapsed_ms(started),
            ),
            Ok(Err(e)) => ExecutionOutcome::failed(
                ExecutionFailure::Wait { reason: e.to_string() },
                elapsed_ms(started),
            ),
            Err(_) => {
                warn!(
                    "{} exceeded {}s; killed",
                    method.file_name(),
                    self.timeout.as_secs_f64()
                );
                if let Some(pid) = pid {
                    kill_group(pid);
                }
                ExecutionOutcome::failed(
                    ExecutionFailure::TimedOut { timeout_ms: self.timeout.as_millis() as u64 },
                    elapsed_ms(started),
                )
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else { return };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!("killpg {}: {}", raw, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}
