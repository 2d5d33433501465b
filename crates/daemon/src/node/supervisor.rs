use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

/// How long `stop` waits after SIGTERM before escalating to SIGKILL.
/// Kubo flushes its datastore and releases the repo lock on SIGTERM.
const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// What to exec when starting the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Exported as `IPFS_PATH` when set.
    pub repo_path: Option<PathBuf>,
}

impl Default for DaemonCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ipfs"),
            args: vec!["daemon".to_string()],
            repo_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Nothing has been spawned (or it was stopped cleanly).
    NotStarted,
    Running { pid: Option<u32> },
    /// The child exited on its own or was stopped; `code` is `None` when it
    /// was terminated by a signal.
    Exited { code: Option<i32> },
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stop daemon: {0}")]
    Stop(#[source] std::io::Error),
    #[error("failed to query daemon status: {0}")]
    Wait(#[source] std::io::Error),
}

/// Sole owner of the daemon child process.
#[derive(Debug)]
pub struct Supervisor {
    command: DaemonCommand,
    child: Option<Child>,
    last_exit: Option<Option<i32>>,
    grace_period: Duration,
}

impl Supervisor {
    pub fn new(command: DaemonCommand) -> Self {
        Self {
            command,
            child: None,
            last_exit: None,
            grace_period: STOP_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Spawn the daemon unless a tracked child is still alive.
    ///
    /// Returns as soon as the process exists; readiness is someone else's job.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait().map_err(SupervisorError::Wait)? {
                None => {
                    tracing::debug!(pid = ?child.id(), "daemon already running");
                    return Ok(());
                }
                Some(status) => {
                    tracing::warn!("daemon exited unexpectedly ({}), restarting", status);
                    self.last_exit = Some(status.code());
                    self.child = None;
                }
            }
        }

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(repo_path) = &self.command.repo_path {
            command.env("IPFS_PATH", repo_path);
        }

        let child = command.spawn().map_err(|source| SupervisorError::Spawn {
            program: self.command.program.display().to_string(),
            source,
        })?;

        tracing::info!(
            pid = ?child.id(),
            "started {} {}",
            self.command.program.display(),
            self.command.args.join(" ")
        );
        self.child = Some(child);
        self.last_exit = None;
        Ok(())
    }

    /// Terminate and reap the tracked child. A no-op when nothing runs.
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        let Some(mut child) = self.child.take() else {
            tracing::debug!("stop requested but no daemon is tracked");
            return Ok(());
        };

        if let Some(status) = child.try_wait().map_err(SupervisorError::Wait)? {
            tracing::info!("daemon had already exited ({})", status);
            self.last_exit = Some(status.code());
            return Ok(());
        }

        tracing::info!(pid = ?child.id(), "stopping daemon");
        terminate(&mut child)?;

        let status = match tokio::time::timeout(self.grace_period, child.wait()).await {
            Ok(status) => status.map_err(SupervisorError::Wait)?,
            Err(_) => {
                tracing::warn!(
                    "daemon did not exit within {:?}, killing it",
                    self.grace_period
                );
                child.kill().await.map_err(SupervisorError::Stop)?;
                child.wait().await.map_err(SupervisorError::Wait)?
            }
        };

        tracing::info!("daemon stopped ({})", status);
        self.last_exit = Some(status.code());
        Ok(())
    }

    pub fn status(&mut self) -> NodeStatus {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return NodeStatus::Running { pid: child.id() },
                Ok(Some(status)) => {
                    self.last_exit = Some(status.code());
                    self.child = None;
                }
                Err(e) => {
                    tracing::warn!("failed to poll daemon status: {}", e);
                    return NodeStatus::Running { pid: child.id() };
                }
            }
        }

        match self.last_exit {
            Some(code) => NodeStatus::Exited { code },
            None => NodeStatus::NotStarted,
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<(), SupervisorError> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet.
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret != 0 {
        return Err(SupervisorError::Stop(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<(), SupervisorError> {
    child.start_kill().map_err(SupervisorError::Stop)
}
