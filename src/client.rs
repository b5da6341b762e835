//! Client-side request/response helpers (`spec.md` §4.7).
use std::{io, os::unix::net::UnixStream};

use serde_json::json;
use tracing::debug;

use crate::{
    config::DaemonConfig,
    daemon_lifecycle,
    engine::Engine,
    error::ControlError,
    protocol::{self, MessagesResponse, Response, StatusResponse, MAX_FRAME_BYTES},
};

fn connect_and_send(config: &DaemonConfig, request: &serde_json::Value) -> Result<Response, ControlError> {
    if !config.socket_path.exists() {
        return Err(ControlError::NotAvailable);
    }

    let mut stream = UnixStream::connect(&config.socket_path)?;
    let bytes = protocol::encode_json(request)?;
    protocol::write_framed(&mut stream, &bytes)?;

    let payload = protocol::read_framed(&mut stream, MAX_FRAME_BYTES)?;
    let response = protocol::decode_json(&payload)?;
    Ok(response)
}

/// Sends `request` to the daemon and returns its response.
///
/// A connection failure does not propagate as an error: the original
/// client distinguishes "the socket file is missing" from other
/// failures by checking whether a live daemon is recorded in the pid
/// file, and folds that diagnosis into a normal `messages` response so
/// callers always have something printable.
pub fn send_command(config: &DaemonConfig, request: &serde_json::Value) -> Response {
    match connect_and_send(config, request) {
        Ok(response) => response,
        Err(ControlError::NotAvailable) => {
            Response::Messages(MessagesResponse::single(socket_missing_message(config)))
        }
        Err(ControlError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
            Response::Messages(MessagesResponse::single(socket_missing_message(config)))
        }
        Err(err) => {
            debug!(%err, "control command failed");
            Response::Messages(MessagesResponse::single(format!("sending command failed: {err}")))
        }
    }
}

fn socket_missing_message(config: &DaemonConfig) -> &'static str {
    if daemon_lifecycle::is_running(&config.pid_path) {
        "sending command failed. are your socket permissions correct?"
    } else {
        "sending command failed. server does not appear to be running."
    }
}

/// Requests `start` for `name`.
pub fn start(config: &DaemonConfig, name: &str) -> Response {
    send_command(config, &json!({"command": "start", "name": name}))
}

/// Requests `stop` for `name`.
pub fn stop(config: &DaemonConfig, name: &str) -> Response {
    send_command(config, &json!({"command": "stop", "name": name}))
}

/// Requests `restart` for `name`.
pub fn restart(config: &DaemonConfig, name: &str) -> Response {
    send_command(config, &json!({"command": "restart", "name": name}))
}

/// Requests `status` for `name` (or every service, if `name` is `"ALL"`).
pub fn status(config: &DaemonConfig, name: &str) -> Response {
    send_command(config, &json!({"command": "status", "name": name}))
}

/// Requests `status` for `names`, per `spec.md` §4.7: the bare sentinel
/// `"ALL"` is forwarded verbatim for the daemon to expand, but a
/// comma-separated list is expanded against `config` on the client side
/// first (any `ALL` element in the list is unioned with every declared
/// service name) and resolved with one request per resulting name.
pub fn status_many(config: &DaemonConfig, names: &str) -> Response {
    if names.trim() == Engine::ALL {
        return status(config, Engine::ALL);
    }

    let mut resolved: Vec<String> = Vec::new();
    for part in names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if part == Engine::ALL {
            resolved.extend(config.service_names());
        } else {
            resolved.push(part.to_string());
        }
    }
    resolved.sort();
    resolved.dedup();

    let mut combined = StatusResponse::new();
    for name in resolved {
        match status(config, &name) {
            Response::Status(single) => combined.extend(single),
            messages @ Response::Messages(_) => return messages,
        }
    }
    Response::Status(combined)
}

/// Renders a [`Response`] the way the original client prints it:
/// `messages` one per line, `status` as `name: status` sorted by name.
pub fn render(response: &Response) -> Vec<String> {
    match response {
        Response::Messages(m) => m.messages.clone(),
        Response::Status(status) => status
            .iter()
            .map(|(name, state)| format!("{name}: {state}"))
            .collect(),
    }
}
