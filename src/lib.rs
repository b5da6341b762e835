//! Local service supervisor: a daemon that manages user-defined child
//! processes ("services") honoring declared dependencies and restart
//! policies, and a client/daemon wire protocol over a Unix domain socket.

#![warn(unused_crate_dependencies)]
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;
#[cfg(test)]
use tempfile as _;
use tracing_subscriber as _;

/// CLI parsing for the `localctl` client.
pub mod cli;

/// Typed configuration loaded from INI files.
pub mod config;

/// Errors shared across the crate.
pub mod error;

/// Daemon lifecycle: pid-file probing, daemonization, shutdown signaling.
pub mod daemon_lifecycle;

/// Event loop / RPC dispatcher.
pub mod dispatcher;

/// Supervision engine: the registry of services.
pub mod engine;

/// Control socket scoped resource.
pub mod ipc;

/// Client-side request/response helpers.
pub mod client;

/// Wire protocol framing and message shapes.
pub mod protocol;

/// Runtime paths (socket/pid-file locations).
pub mod runtime;

/// Per-service process lifecycle state machine.
pub mod service;
