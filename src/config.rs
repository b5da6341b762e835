//! Configuration loading for locald.
//!
//! Configuration is INI (see `spec.md` §6): a root file with a
//! `[locald]` section naming the socket and pid-file paths plus one
//! section per declared service (whose only key, `service_path`,
//! points at that service's own INI file), and per-service files with
//! a `[service]` section describing the command line, restart policy,
//! and dependencies.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use ini::Ini;

use crate::error::ConfigError;

/// Root daemon configuration: socket/pid-file locations plus the
/// service name -> config-file mapping.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path to the control socket.
    pub socket_path: PathBuf,
    /// Path to the pid file.
    pub pid_path: PathBuf,
    /// Working directory the daemon should `chdir` into, if given.
    pub working_dir: Option<PathBuf>,
    /// Directory the root config file was found in; relative
    /// `service_path`/`log_path` values resolve against this.
    pub config_dir: PathBuf,
    /// Declared services, keyed by name.
    pub services: HashMap<String, ServiceRef>,
}

/// A pointer to a service's own configuration file.
#[derive(Debug, Clone)]
pub struct ServiceRef {
    /// Path to the per-service INI file (may be relative).
    pub service_path: PathBuf,
}

/// Restart policy for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// An exit is terminal; the engine never respawns the service.
    Never,
    /// An unexpected exit triggers a respawn after `restart_seconds`.
    Always,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::Never
    }
}

/// Per-service configuration, loaded from the file a [`ServiceRef`] points at.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name, filled in by the caller (not stored in the file itself).
    pub name: String,
    /// Shell-word-split command line.
    pub command: Vec<String>,
    /// Optional log file path (resolved against the root config's directory).
    pub log_path: Option<PathBuf>,
    /// Ordered list of service names that must be started first.
    pub requires: Vec<String>,
    /// Restart policy.
    pub restart: RestartPolicy,
    /// Backoff in seconds before a restart (meaningful only with `Always`).
    pub restart_seconds: u64,
}

impl DaemonConfig {
    /// Loads the root daemon configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = load_ini(path)?;
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let section = ini.section(Some("locald")).ok_or_else(|| ConfigError::Malformed {
            path: path.to_path_buf(),
            reason: "missing top-level '[locald]' section".to_string(),
        })?;

        let socket_path = required_path(section, path, "locald", "socket_path")?;
        let pid_path = required_path(section, path, "locald", "pid_path")?;
        let working_dir = section.get("working_dir").map(PathBuf::from);

        let mut services = HashMap::new();
        for (name, props) in ini.iter() {
            let Some(name) = name else { continue };
            if name == "locald" {
                continue;
            }

            let service_path = props.get("service_path").ok_or_else(|| ConfigError::MissingKey {
                path: path.to_path_buf(),
                section: name.to_string(),
                key: "service_path".to_string(),
            })?;

            services.insert(
                name.to_string(),
                ServiceRef {
                    service_path: PathBuf::from(service_path),
                },
            );
        }

        Ok(DaemonConfig {
            socket_path,
            pid_path,
            working_dir,
            config_dir,
            services,
        })
    }

    /// Returns `true` if `name` is a declared service.
    pub fn has_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Returns every declared service name.
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    /// Loads and resolves the [`ServiceConfig`] for a declared service.
    ///
    /// Relative `service_path` and `log_path` values are resolved
    /// against [`DaemonConfig::config_dir`].
    pub fn resolve_service(&self, name: &str) -> Result<ServiceConfig, ConfigError> {
        let service_ref = self
            .services
            .get(name)
            .expect("caller must check has_service before resolving");

        let mut service_path = service_ref.service_path.clone();
        if service_path.is_relative() {
            service_path = self.config_dir.join(service_path);
        }

        let mut config = ServiceConfig::load(&service_path)?;
        config.name = name.to_string();

        if let Some(log_path) = config.log_path.take() {
            let resolved = if log_path.is_relative() {
                self.config_dir.join(log_path)
            } else {
                log_path
            };
            config.log_path = Some(resolved);
        }

        Ok(config)
    }
}

impl ServiceConfig {
    /// Loads a per-service configuration from its own INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = load_ini(path)?;
        let section = ini.section(Some("service")).ok_or_else(|| ConfigError::Malformed {
            path: path.to_path_buf(),
            reason: "missing top-level '[service]' section".to_string(),
        })?;

        let command_line = section.get("command").ok_or_else(|| ConfigError::MissingKey {
            path: path.to_path_buf(),
            section: "service".to_string(),
            key: "command".to_string(),
        })?;

        let command = shell_words::split(command_line).map_err(|err| ConfigError::InvalidCommand {
            command: command_line.to_string(),
            reason: err.to_string(),
        })?;

        let log_path = section.get("log_path").map(PathBuf::from);
        let requires = parse_requires(section.get("requires").unwrap_or(""));

        let restart = match section.get("restart").unwrap_or("never") {
            "always" => RestartPolicy::Always,
            _ => RestartPolicy::Never,
        };

        let restart_seconds = section
            .get("restart_seconds")
            .unwrap_or("0")
            .parse::<u64>()
            .unwrap_or(0);

        Ok(ServiceConfig {
            name: String::new(),
            command,
            log_path,
            requires,
            restart,
            restart_seconds,
        })
    }
}

/// Splits a comma-separated dependency list, trimming whitespace and
/// dropping empty elements (per `spec.md` §4.2).
fn parse_requires(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_ini(path: &Path) -> Result<Ini, ConfigError> {
    Ini::load_from_file(path).map_err(|err| match err {
        ini::Error::Io(source) => ConfigError::Read {
            path: path.to_path_buf(),
            source,
        },
        ini::Error::Parse(parse_err) => ConfigError::Malformed {
            path: path.to_path_buf(),
            reason: parse_err.to_string(),
        },
    })
}

fn required_path(
    section: &ini::Properties,
    path: &Path,
    section_name: &str,
    key: &str,
) -> Result<PathBuf, ConfigError> {
    section
        .get(key)
        .map(PathBuf::from)
        .ok_or_else(|| ConfigError::MissingKey {
            path: path.to_path_buf(),
            section: section_name.to_string(),
            key: key.to_string(),
        })
}
