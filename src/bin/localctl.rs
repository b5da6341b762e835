//! `localctl`: client for a running `locald` daemon.
use std::{
    error::Error,
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

use tracing_subscriber::EnvFilter;

use locald::{
    cli::{self, Commands},
    client,
    config::DaemonConfig,
    daemon_lifecycle::{self, PosixDaemonizer},
    runtime,
};

fn main() -> ExitCode {
    let args = cli::parse_args();

    if !args.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .init();
    }

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("localctl: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: cli::Cli) -> Result<ExitCode, Box<dyn Error>> {
    let config_path = match args.config {
        Some(path) => path,
        None => runtime::find_default_config(&runtime::current_dir()?)
            .ok_or("no locald.ini found in the current directory or its ancestors")?,
    };

    let config = DaemonConfig::load(&config_path)?;

    match args.command {
        Commands::ServerStart { no_daemonize } => {
            daemon_lifecycle::ensure_started(config, no_daemonize, &PosixDaemonizer)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ServerStop => {
            daemon_lifecycle::stop(&config);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ServerWait { timeout } => {
            if wait_for_server(&config, Duration::from_secs(timeout)) {
                Ok(ExitCode::SUCCESS)
            } else {
                println!("daemon did not become ready within {timeout}s");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::ServerStatus => {
            if daemon_lifecycle::is_running(&config.pid_path) {
                println!("daemon is running");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("daemon NOT running");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Start { name } => {
            print_response(&client::start(&config, &name));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stop { name } => {
            print_response(&client::stop(&config, &name));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Restart { name } => {
            print_response(&client::restart(&config, &name));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { name } => {
            print_response(&client::status_many(&config, &name));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Logs { name, no_follow: _ } => {
            println!("no logs to tail for '{name}'");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_response(response: &locald::protocol::Response) {
    for line in client::render(response) {
        println!("{line}");
    }
}

/// Polls for the daemon's pid file and control socket to both exist,
/// at a fixed interval, until `timeout` elapses.
fn wait_for_server(config: &DaemonConfig, timeout: Duration) -> bool {
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    let deadline = Instant::now() + timeout;
    loop {
        if config.pid_path.exists() && config.socket_path.exists() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}
