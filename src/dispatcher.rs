//! Event loop / RPC dispatcher (`spec.md` §4.5).
//!
//! A single-threaded, readiness-based server loop modeled on the
//! original `select.select`-based design: a listening socket plus a set
//! of client connections, each polled for readability (is there a
//! complete request to decode yet?) and, once a request has been
//! decoded, writability (can the response be sent?). `libc::poll` plays
//! the role the original's `select` does.
use std::{
    collections::VecDeque,
    io::{Read, Write},
    os::fd::AsRawFd,
    os::unix::net::UnixStream,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    engine::Engine,
    error::DaemonError,
    ipc::ControlSocket,
    protocol::{self, MessagesResponse, Response, MAX_FRAME_BYTES},
};

/// Ceiling on a single non-blocking read, matching the "at least 1 MiB"
/// receive buffer `spec.md` §4.5 calls for.
const RECV_CHUNK_BYTES: usize = 1024 * 1024;

/// Readiness-wait timeout, in milliseconds. Matches the original
/// one-second `select` timeout so `Engine::tend_all` runs at a bounded
/// cadence even when no connections are active.
const POLL_TIMEOUT_MS: i32 = 1000;

struct Connection {
    stream: UnixStream,
    read_buf: Vec<u8>,
    queue: VecDeque<Vec<u8>>,
}

impl Connection {
    fn new(stream: UnixStream) -> Self {
        Connection {
            stream,
            read_buf: Vec::new(),
            queue: VecDeque::new(),
        }
    }
}

/// Owns the bound control socket, the open client connections, and the
/// [`Engine`] requests are dispatched against.
pub struct Dispatcher {
    socket: ControlSocket,
    engine: Engine,
    connections: Vec<Connection>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Dispatcher {
    /// Builds a dispatcher over an already-bound socket and a fresh engine.
    pub fn new(socket: ControlSocket, engine: Engine) -> Self {
        Dispatcher {
            socket,
            engine,
            connections: Vec::new(),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the event loop until `SIGINT` arrives, then kills every
    /// supervised service before returning. The shutdown path runs on
    /// every exit, including one triggered by a propagated I/O error.
    pub fn run(&mut self) -> Result<(), DaemonError> {
        let flag = Arc::clone(&self.shutdown_requested);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|err| DaemonError::Io(std::io::Error::other(err)))?;

        let result = self.run_loop();

        info!("shutting down: killing all supervised services");
        self.engine.shutdown();

        result
    }

    fn run_loop(&mut self) -> Result<(), DaemonError> {
        loop {
            if self.shutdown_requested.load(Ordering::SeqCst) {
                info!("shutdown requested, exiting event loop");
                return Ok(());
            }

            self.poll_once()?;
            self.engine.tend_all();
        }
    }

    fn poll_once(&mut self) -> Result<(), DaemonError> {
        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(1 + self.connections.len());
        fds.push(libc::pollfd {
            fd: self.socket.listener().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        for conn in &self.connections {
            let mut events = libc::POLLIN;
            if !conn.queue.is_empty() {
                events |= libc::POLLOUT;
            }
            fds.push(libc::pollfd {
                fd: conn.stream.as_raw_fd(),
                events,
                revents: 0,
            });
        }

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_TIMEOUT_MS) };
        if ready < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(DaemonError::Io(err));
        }
        if ready == 0 {
            return Ok(());
        }

        if fds[0].revents & libc::POLLIN != 0 {
            self.accept_pending();
        }

        let mut to_remove = Vec::new();
        for (index, fd) in fds.iter().enumerate().skip(1) {
            let conn_index = index - 1;
            if fd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
                debug!(fd = fd.fd, "exceptional condition on connection, closing");
                to_remove.push(conn_index);
                continue;
            }
            if fd.revents & libc::POLLIN != 0 && !self.read_ready(conn_index) {
                to_remove.push(conn_index);
            }
        }

        for index in 0..self.connections.len() {
            if to_remove.contains(&index) || self.connections[index].queue.is_empty() {
                continue;
            }
            let writable = fds
                .get(index + 1)
                .map(|fd| fd.revents & libc::POLLOUT != 0)
                .unwrap_or(false);
            if writable && !self.respond_ready(index) {
                to_remove.push(index);
            }
        }

        to_remove.sort_unstable();
        to_remove.dedup();
        for index in to_remove.into_iter().rev() {
            self.connections.remove(index);
        }

        Ok(())
    }

    fn accept_pending(&mut self) {
        loop {
            match self.socket.listener().accept() {
                Ok((stream, _addr)) => {
                    if let Err(err) = stream.set_nonblocking(true) {
                        warn!(%err, "failed to set accepted connection non-blocking");
                        continue;
                    }
                    debug!("accepted new connection");
                    self.connections.push(Connection::new(stream));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(%err, "failed to accept connection");
                    break;
                }
            }
        }
    }

    /// Reads whatever is available on `conn_index`'s socket, extracting
    /// complete frames into its queue. Returns `false` if the connection
    /// should be closed (peer hung up, read error, or framing error).
    fn read_ready(&mut self, conn_index: usize) -> bool {
        let conn = &mut self.connections[conn_index];
        let mut chunk = vec![0u8; RECV_CHUNK_BYTES];
        match conn.stream.read(&mut chunk) {
            Ok(0) => {
                debug!("closing connection after reading no data");
                false
            }
            Ok(n) => {
                conn.read_buf.extend_from_slice(&chunk[..n]);
                loop {
                    match protocol::try_take_frame(&mut conn.read_buf, MAX_FRAME_BYTES) {
                        Ok(Some(payload)) => conn.queue.push_back(payload),
                        Ok(None) => break,
                        Err(err) => {
                            warn!(%err, "closing connection after framing error");
                            return false;
                        }
                    }
                }
                true
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(err) => {
                warn!(%err, "read error, closing connection");
                false
            }
        }
    }

    /// Dequeues one pending request from `conn_index`, dispatches it,
    /// and writes back the framed response. Returns `false` if the
    /// connection should be closed (write failure).
    fn respond_ready(&mut self, conn_index: usize) -> bool {
        let payload = match self.connections[conn_index].queue.pop_front() {
            Some(payload) => payload,
            None => {
                warn!("output queue empty for a writable connection");
                return true;
            }
        };

        let response = self.dispatch(&payload);
        let encoded = match protocol::encode_json(&response) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "failed to encode response");
                return true;
            }
        };

        match protocol::write_framed(&mut self.connections[conn_index].stream, &encoded) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "failed to write response, closing connection");
                false
            }
        }
    }

    fn dispatch(&mut self, payload: &[u8]) -> Response {
        let value: Value = match protocol::decode_value(payload) {
            Ok(value) => value,
            Err(_err) => {
                return Response::Messages(MessagesResponse::single(format!(
                    "invalid command '{}' received from client",
                    String::from_utf8_lossy(payload)
                )));
            }
        };

        let Some(command) = value.get("command").and_then(Value::as_str) else {
            return Response::Messages(MessagesResponse::single(format!(
                "invalid command '{value}' received from client"
            )));
        };

        let name = value.get("name").and_then(Value::as_str).unwrap_or(Engine::ALL);

        match command {
            "start" => Response::Messages(MessagesResponse {
                messages: self.engine.start(name),
            }),
            "stop" => Response::Messages(MessagesResponse {
                messages: self.engine.stop(name),
            }),
            "restart" => Response::Messages(MessagesResponse {
                messages: self.engine.restart(name),
            }),
            "status" => Response::Status(self.engine.status(name)),
            other => Response::Messages(MessagesResponse::single(format!("unknown command '{other}'"))),
        }
    }
}
