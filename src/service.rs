//! Per-service process lifecycle state machine (`spec.md` §4.1).
use std::{
    fs::OpenOptions,
    io,
    process::{Child, Command, Stdio},
    time::{Duration, SystemTime},
};

use nix::{
    sys::signal::{self, Signal},
    unistd::Pid as NixPid,
};
use sysinfo::{Pid as SysPid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use crate::config::{RestartPolicy, ServiceConfig};

/// The four states a service's process lifecycle can be in, per
/// `spec.md` §3. Surfaced for tests and diagnostics; the engine's
/// `status` RPC collapses `Stopped` and `DeadWaitingRestart` into a
/// single `STOPPED` string (see `spec.md` §9 and `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// The service has never had a child process.
    NotStarted,
    /// The child process is alive.
    Running,
    /// The child exited after an explicit stop/restart request.
    Stopped,
    /// The child exited unexpectedly; restart policy is `always` and
    /// the backoff window has not yet elapsed.
    DeadWaitingRestart,
}

/// A single supervised child process and its lifecycle bookkeeping.
pub struct Service {
    name: String,
    config: ServiceConfig,
    child: Option<Child>,
    ever_started: bool,
    dead_since: Option<SystemTime>,
    was_killed: bool,
}

impl Service {
    /// Creates a fresh, not-yet-started service record.
    pub fn new(config: ServiceConfig) -> Self {
        Service {
            name: config.name.clone(),
            config,
            child: None,
            ever_started: false,
            dead_since: None,
            was_killed: false,
        }
    }

    /// The service's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` iff the child is currently alive.
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// The lifecycle state, per `spec.md` §3.
    pub fn state(&mut self) -> ServiceState {
        if self.is_running() {
            return ServiceState::Running;
        }

        if !self.ever_started {
            return ServiceState::NotStarted;
        }

        match self.dead_since {
            Some(_) if self.config.restart == RestartPolicy::Always => {
                ServiceState::DeadWaitingRestart
            }
            _ => ServiceState::Stopped,
        }
    }

    /// Starts the child process. No-op if a child is already alive.
    ///
    /// If a log path is configured, both stdout and stderr are
    /// redirected to it (append mode); the parent's `File` handle is
    /// dropped as soon as the child has inherited the descriptor.
    pub fn start(&mut self) -> io::Result<()> {
        if self.is_running() {
            debug!(service = %self.name, "already running, not starting");
            return Ok(());
        }

        if self.config.command.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "service command is empty",
            ));
        }

        info!(service = %self.name, "starting service");

        let mut cmd = Command::new(&self.config.command[0]);
        cmd.args(&self.config.command[1..]);

        if let Some(log_path) = &self.config.log_path {
            let file = OpenOptions::new().create(true).append(true).open(log_path)?;
            cmd.stdout(Stdio::from(file.try_clone()?));
            cmd.stderr(Stdio::from(file));
        } else {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }

        let child = cmd.spawn()?;
        self.ever_started = true;
        self.child = Some(child);
        self.dead_since = None;
        self.was_killed = false;

        Ok(())
    }

    /// Sends `SIGKILL` to the child and every descendant process.
    /// No-op if no child is alive. Does not wait for the exit; that is
    /// observed by the next [`Service::tend`].
    pub fn kill(&mut self) {
        let Some(child) = &self.child else {
            return;
        };
        let pid = child.id();

        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let root = SysPid::from_u32(pid);
        for descendant in collect_descendants(&system, root) {
            let _ = signal::kill(NixPid::from_raw(descendant.as_u32() as i32), Signal::SIGKILL);
        }

        if let Err(err) = signal::kill(NixPid::from_raw(pid as i32), Signal::SIGKILL) {
            warn!(service = %self.name, pid, %err, "failed to signal service (already exited?)");
        }

        info!(service = %self.name, pid, "kill signal sent");
        self.was_killed = true;
    }

    /// Equivalent to [`Service::kill`] followed by [`Service::start`].
    /// `was_killed` stays `true` across the kill and is cleared by the
    /// subsequent spawn.
    ///
    /// `kill()` only signals the child; the kernel has not necessarily
    /// reaped it by the time `kill()` returns, so `start()`'s
    /// `is_running()` guard could otherwise see the dying child as
    /// still alive and skip the respawn. Reap it explicitly first.
    pub fn restart(&mut self) -> io::Result<()> {
        self.kill();
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        self.start()
    }

    /// Single-step state progression: reap an exited child, record
    /// `dead_since`, and respawn per restart policy if the backoff has
    /// elapsed.
    pub fn tend(&mut self) {
        if let Some(child) = &mut self.child {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(service = %self.name, ?status, "service exited");
                    self.child = None;
                    if !self.was_killed {
                        self.dead_since = Some(SystemTime::now());
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    warn!(service = %self.name, %err, "error polling exit status");
                    self.child = None;
                }
            }
        }

        if self.child.is_some() {
            return;
        }

        let Some(dead_since) = self.dead_since else {
            return;
        };

        if self.config.restart != RestartPolicy::Always {
            return;
        }

        let elapsed = SystemTime::now()
            .duration_since(dead_since)
            .unwrap_or(Duration::ZERO);

        if elapsed >= Duration::from_secs(self.config.restart_seconds)
            && let Err(err) = self.start()
        {
            warn!(service = %self.name, %err, "automatic restart failed");
        }
    }
}

/// Walks the process table collecting every descendant of `root`
/// (children, grandchildren, ...), best-effort.
fn collect_descendants(system: &System, root: SysPid) -> Vec<SysPid> {
    let mut out = Vec::new();
    let mut stack = vec![root];

    while let Some(pid) = stack.pop() {
        for (candidate, process) in system.processes() {
            if process.parent() == Some(pid) {
                out.push(*candidate);
                stack.push(*candidate);
            }
        }
    }

    out
}
