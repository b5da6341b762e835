//! Command-line interface for `localctl` (`spec.md` §6).
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `localctl`: client for a running `locald` daemon.
#[derive(Parser)]
#[command(name = "localctl", version, author)]
#[command(about = "Client for the locald service supervisor", long_about = None)]
pub struct Cli {
    /// Path to the root `locald.ini` configuration file. Defaults to
    /// searching the current directory and its ancestors.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress informational output; only errors are printed.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available `localctl` subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Starts the daemon if it is not already running.
    ServerStart {
        /// Run the daemon in the foreground instead of detaching.
        #[arg(long)]
        no_daemonize: bool,
    },

    /// Signals the running daemon to shut down.
    ServerStop,

    /// Polls for the daemon to become reachable.
    ServerWait {
        /// Total time to wait, in seconds, before giving up.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Reports whether the daemon is running.
    ServerStatus,

    /// Starts a service (and its declared dependencies).
    Start {
        /// Service name.
        name: String,
    },

    /// Sends a kill signal to a running service.
    Stop {
        /// Service name.
        name: String,
    },

    /// Restarts a service.
    Restart {
        /// Service name.
        name: String,
    },

    /// Reports the status of a service, or of every declared service.
    Status {
        /// Service name, a comma-separated list of names, or `ALL` for
        /// every declared service.
        #[arg(default_value = "ALL")]
        name: String,
    },

    /// Tails a service's log file. Out of scope for this daemon (see
    /// `spec.md`'s Non-goals): always reports nothing to tail.
    Logs {
        /// Service name.
        name: String,

        /// Print the current log contents and exit instead of following.
        #[arg(long)]
        no_follow: bool,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
