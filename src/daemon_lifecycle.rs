//! Daemon lifecycle: pid-file probing and daemonization (`spec.md` §4.6).
use std::{
    fs,
    io,
    path::Path,
};

use nix::{
    sys::signal::{self, Signal},
    unistd::{fork, setsid, ForkResult, Pid},
};
use tracing::{debug, info, warn};

use crate::{config::DaemonConfig, dispatcher::Dispatcher, engine::Engine, error::DaemonError, ipc::ControlSocket};

/// Reads and parses the pid recorded at `pid_path`.
fn read_pid(pid_path: &Path) -> io::Result<libc::pid_t> {
    let raw = fs::read_to_string(pid_path)?;
    raw.trim()
        .parse::<libc::pid_t>()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

/// Writes `pid` to `pid_path`, truncating any previous contents.
fn write_pid(pid_path: &Path, pid: libc::pid_t) -> io::Result<()> {
    fs::write(pid_path, pid.to_string())
}

/// `true` if `pid_path` names a process that is currently alive, probed
/// with a signal-0 `kill` (`spec.md` §4.6).
pub fn is_running(pid_path: &Path) -> bool {
    if !pid_path.exists() {
        return false;
    }

    let pid = match read_pid(pid_path) {
        Ok(pid) => pid,
        Err(_) => return false,
    };

    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Sends `SIGINT` to the daemon recorded at `config.pid_path`, asking it
/// to run its shutdown path and exit. Returns `false` if no pid file
/// was present or the signal could not be delivered.
pub fn stop(config: &DaemonConfig) -> bool {
    if !config.pid_path.exists() {
        return false;
    }

    let pid = match read_pid(&config.pid_path) {
        Ok(pid) => pid,
        Err(err) => {
            warn!(%err, "failed to read pid file");
            return false;
        }
    };

    match signal::kill(Pid::from_raw(pid), Signal::SIGINT) {
        Ok(()) => true,
        Err(err) => {
            warn!(pid, %err, "failed to signal daemon");
            false
        }
    }
}

/// Decouples the event loop from the mechanics of backgrounding the
/// process, so `ensure_started` can drive either a foreground run or a
/// daemonized one identically.
pub trait Daemonizer {
    /// Forks into the background. Returns `true` in the process that
    /// should continue running the daemon, `false` in the one that
    /// should exit immediately (the original foreground process, and
    /// the intermediate fork in a double-fork).
    fn daemonize(&self) -> Result<bool, DaemonError>;
}

/// Classic double-fork-and-`setsid` daemonization: the first fork
/// detaches from the controlling terminal's process group, `setsid`
/// makes the intermediate process a session leader, and the second
/// fork ensures the final process can never reacquire a controlling
/// terminal.
pub struct PosixDaemonizer;

impl Daemonizer for PosixDaemonizer {
    fn daemonize(&self) -> Result<bool, DaemonError> {
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => return Ok(false),
            ForkResult::Child => {}
        }

        setsid()?;

        match unsafe { fork() }? {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {}
        }

        std::env::set_current_dir("/").map_err(DaemonError::Io)?;
        redirect_standard_streams_to_null().map_err(DaemonError::Io)?;

        Ok(true)
    }
}

fn redirect_standard_streams_to_null() -> io::Result<()> {
    use std::os::fd::IntoRawFd;

    let devnull = fs::File::open("/dev/null")?;
    let fd = devnull.into_raw_fd();
    unsafe {
        libc::dup2(fd, libc::STDIN_FILENO);
        libc::dup2(fd, libc::STDOUT_FILENO);
        libc::dup2(fd, libc::STDERR_FILENO);
        if fd > libc::STDERR_FILENO {
            libc::close(fd);
        }
    }
    Ok(())
}

/// Ensures a daemon is running for `config`, starting one if not.
///
/// If `no_daemonize` is set the current process runs the event loop
/// directly (useful for tests and foreground debugging); otherwise
/// `daemonizer` backgrounds the process first. Either way the pid file
/// is written before the event loop starts and removed once it exits.
pub fn ensure_started(
    config: DaemonConfig,
    no_daemonize: bool,
    daemonizer: &dyn Daemonizer,
) -> Result<(), DaemonError> {
    if is_running(&config.pid_path) {
        info!(pid_path = %config.pid_path.display(), "daemon already running");
        return Ok(());
    }

    if !no_daemonize {
        let should_continue = daemonizer.daemonize()?;
        if !should_continue {
            return Ok(());
        }
    }

    run_foreground(config)
}

/// Writes the pid file, runs the dispatcher loop to completion, and
/// removes the pid file on the way out (normal or error exit).
fn run_foreground(config: DaemonConfig) -> Result<(), DaemonError> {
    write_pid(&config.pid_path, std::process::id() as libc::pid_t).map_err(DaemonError::Io)?;

    if let Some(working_dir) = &config.working_dir {
        std::env::set_current_dir(working_dir).map_err(DaemonError::Io)?;
    }

    let socket = ControlSocket::bind(&config.socket_path).map_err(DaemonError::Io)?;
    let engine = Engine::new(config.clone());
    let mut dispatcher = Dispatcher::new(socket, engine);

    let result = dispatcher.run();

    debug!(pid_path = %config.pid_path.display(), "removing pid file");
    if let Err(err) = fs::remove_file(&config.pid_path)
        && err.kind() != io::ErrorKind::NotFound
    {
        warn!(%err, "failed to remove pid file");
    }

    result
}
