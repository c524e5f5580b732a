/*!
 * Process Control
 *
 * Spawning and signalling native processes. Supervision (restart policy)
 * is not done here; the kernel only starts, stops, and reaps.
 */

use super::types::{LaunchArguments, ProcessSignal};
use crate::apps::AppDescriptor;
use crate::core::errors::{LifecycleError, LifecycleResult};
use crate::core::types::Pid;
use ahash::RandomState;
use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal as UnixSignal};
#[cfg(unix)]
use nix::unistd::Pid as NixPid;

/// Process spawning primitives
pub trait ProcessController: Send {
    fn spawn(&mut self, app: &AppDescriptor, args: &LaunchArguments) -> LifecycleResult<Pid>;

    fn signal(&mut self, pid: Pid, signal: ProcessSignal) -> LifecycleResult<()>;

    /// Pids that exited since the last call
    fn reap(&mut self) -> Vec<Pid>;
}

/// Controller backed by real OS processes
#[derive(Default)]
pub struct OsProcessController {
    children: HashMap<Pid, Child, RandomState>,
}

impl OsProcessController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self) -> usize {
        self.children.len()
    }
}

impl ProcessController for OsProcessController {
    fn spawn(&mut self, app: &AppDescriptor, args: &LaunchArguments) -> LifecycleResult<Pid> {
        let mut cmd = Command::new(&args.exec_path);
        cmd.args(&args.args)
            .envs(args.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|e| LifecycleError::SpawnFailed {
            app_id: app.id.clone(),
            reason: e.to_string(),
        })?;

        let pid = child.id();
        info!(app_id = %app.id, pid, exec = %args.exec_path.display(), "native process spawned");
        self.children.insert(pid, child);
        Ok(pid)
    }

    #[cfg(unix)]
    fn signal(&mut self, pid: Pid, signal: ProcessSignal) -> LifecycleResult<()> {
        let sig = match signal {
            ProcessSignal::Terminate => UnixSignal::SIGTERM,
            ProcessSignal::Kill => UnixSignal::SIGKILL,
        };

        match kill(NixPid::from_raw(pid as i32), sig) {
            Ok(()) => {
                debug!(pid, signal = ?signal, "signal delivered");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(pid, "signal target already gone");
                Ok(())
            }
            Err(e) => Err(LifecycleError::InvalidRequest(format!(
                "failed to signal pid {}: {}",
                pid, e
            ))),
        }
    }

    #[cfg(not(unix))]
    fn signal(&mut self, pid: Pid, _signal: ProcessSignal) -> LifecycleResult<()> {
        let child = self.children.get_mut(&pid).ok_or_else(|| {
            LifecycleError::InvalidRequest(format!("pid {} is not a tracked child", pid))
        })?;
        child
            .kill()
            .map_err(|e| LifecycleError::InvalidRequest(format!("failed to kill pid {}: {}", pid, e)))
    }

    fn reap(&mut self) -> Vec<Pid> {
        let mut exited = Vec::new();

        for (pid, child) in self.children.iter_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(pid, status = ?status, "native process exited");
                    exited.push(*pid);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(pid, error = %e, "failed to poll native process");
                    exited.push(*pid);
                }
            }
        }

        for pid in &exited {
            self.children.remove(pid);
        }
        exited
    }
}
