//! Error handling for locald.
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or resolving configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The named configuration file could not be read from disk.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file was readable but not valid INI, or was missing a
    /// required top-level section.
    #[error("malformed config file '{path}': {reason}")]
    Malformed {
        /// Path to the offending file.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// A required key was absent from a section.
    #[error("config file '{path}' is missing required key '{key}' in section '{section}'")]
    MissingKey {
        /// Path to the offending file.
        path: PathBuf,
        /// Section the key was expected in.
        section: String,
        /// The missing key.
        key: String,
    },

    /// A command line could not be split into words.
    #[error("invalid command line '{command}': {reason}")]
    InvalidCommand {
        /// The offending command string.
        command: String,
        /// Reason the split failed.
        reason: String,
    },
}

/// Errors raised by the control channel helpers (`ipc` module).
#[derive(Debug, Error)]
pub enum ControlError {
    /// Control socket I/O error.
    #[error("control socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Error serializing or deserializing control messages.
    #[error("failed to encode/decode control message: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    /// The control socket does not exist; the daemon is presumably not running.
    #[error("control socket not available")]
    NotAvailable,
}

/// Errors raised by wire-protocol framing and (de)serialization.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error while reading or writing a frame.
    #[error("I/O error while framing message: {0}")]
    Io(#[from] std::io::Error),

    /// The payload was not valid UTF-8 JSON.
    #[error("failed to parse message as JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// A declared frame length exceeded the configured ceiling.
    #[error("frame length {got} exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Declared frame length.
        got: u32,
        /// Maximum permitted frame length.
        max: u32,
    },
}

/// Top-level daemon error. Only conditions that should terminate the
/// daemon process are represented here; recoverable per-request errors
/// are folded into response `messages` instead (see `spec.md` §7).
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Error loading or resolving configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error on the control socket or runtime filesystem state.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Unexpected I/O error escaping the event loop (bind failure,
    /// exhausted descriptors, readiness-wait failure).
    #[error("fatal I/O error in event loop: {0}")]
    Io(#[from] std::io::Error),

    /// Failure raised by a `nix` system call.
    #[error("system call failed: {0}")]
    Errno(#[from] nix::errno::Errno),
}
