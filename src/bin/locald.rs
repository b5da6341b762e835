//! `locald`: the service supervisor daemon entry point.
//!
//! This binary runs the event loop directly; it is what `localctl
//! server-start` daemonizes into, and can also be invoked directly
//! (e.g. under an external process supervisor, with `--no-daemonize`).
use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use locald::{
    config::DaemonConfig,
    daemon_lifecycle::{self, PosixDaemonizer},
    runtime,
};

#[derive(Parser)]
#[command(name = "locald", version, author)]
#[command(about = "Local service supervisor daemon", long_about = None)]
struct Args {
    /// Path to the root `locald.ini` configuration file. Defaults to
    /// searching the current directory and its ancestors.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in the foreground instead of daemonizing.
    #[arg(long)]
    no_daemonize: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        error!(%err, "locald exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => runtime::find_default_config(&runtime::current_dir()?)
            .ok_or("no locald.ini found in the current directory or its ancestors")?,
    };

    let config = DaemonConfig::load(&config_path)?;
    daemon_lifecycle::ensure_started(config, args.no_daemonize, &PosixDaemonizer)?;

    Ok(())
}
