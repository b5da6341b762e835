//! Supervision engine: the name-keyed registry of services (`spec.md` §4.2).
use std::collections::{BTreeMap, HashMap};
#[cfg(test)]
use std::collections::HashSet;

use tracing::{info, warn};

use crate::{
    config::DaemonConfig,
    service::Service,
};

/// The registry of services known to a running daemon, plus the
/// configuration used to resolve names and dependencies.
pub struct Engine {
    config: DaemonConfig,
    services: HashMap<String, Service>,
}

impl Engine {
    /// Creates an engine over `config`. No services are started yet;
    /// records are created lazily on first `start`.
    pub fn new(config: DaemonConfig) -> Self {
        Engine {
            config,
            services: HashMap::new(),
        }
    }

    /// The bound daemon configuration.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Starts `name`, recursively starting its declared dependencies
    /// first. Returns the accumulated human-readable messages exactly
    /// as `spec.md` §4.2/§8 describe (a trailing `"started '<name>'"`
    /// on success; an abort message, with whatever dependency messages
    /// preceded it, on failure).
    pub fn start(&mut self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let (messages, _is_error) = self.start_inner(name, &mut chain);
        messages
    }

    fn start_inner(&mut self, name: &str, chain: &mut Vec<String>) -> (Vec<String>, bool) {
        if !self.config.has_service(name) {
            return (vec![format!("unknown service '{name}'")], true);
        }

        if chain.contains(&name.to_string()) {
            let mut cycle: Vec<String> = chain.clone();
            cycle.push(name.to_string());
            return (
                vec![format!("dependency cycle detected: {}", cycle.join(" -> "))],
                true,
            );
        }

        let requires = match self.config.resolve_service(name) {
            Ok(cfg) => cfg.requires.clone(),
            Err(err) => {
                return (
                    vec![format!("failed to load configuration for '{name}': {err}")],
                    true,
                );
            }
        };

        for dep in &requires {
            if !self.config.has_service(dep) {
                return (vec![format!("unknown required service '{dep}'")], true);
            }
        }

        let mut messages = Vec::new();
        chain.push(name.to_string());
        for dep in &requires {
            let (dep_messages, dep_failed) = self.start_inner(dep, chain);
            messages.extend(dep_messages);
            if dep_failed {
                chain.pop();
                return (messages, true);
            }
        }
        chain.pop();

        if !self.services.contains_key(name) {
            match self.config.resolve_service(name) {
                Ok(cfg) => {
                    self.services.insert(name.to_string(), Service::new(cfg));
                }
                Err(err) => {
                    messages.push(format!("failed to load configuration for '{name}': {err}"));
                    return (messages, true);
                }
            }
        }

        let service = self.services.get_mut(name).expect("just inserted or already present");
        if let Err(err) = service.start() {
            messages.push(format!("failed to start '{name}': {err}"));
            return (messages, true);
        }

        messages.push(format!("started '{name}'"));
        (messages, false)
    }

    /// Sends a kill signal to `name`'s child process, if any.
    pub fn stop(&mut self, name: &str) -> Vec<String> {
        if !self.config.has_service(name) {
            return vec![format!("unknown service '{name}'")];
        }

        match self.services.get_mut(name) {
            None => vec![format!("'{name}' is not running")],
            Some(service) => {
                service.kill();
                vec![format!("kill signal sent to '{name}'")]
            }
        }
    }

    /// Restarts `name`. If no record exists yet, behaves as `start`.
    pub fn restart(&mut self, name: &str) -> Vec<String> {
        if !self.services.contains_key(name) {
            return self.start(name);
        }

        let service = self.services.get_mut(name).expect("checked above");
        match service.restart() {
            Ok(()) => vec![format!("restarted '{name}'")],
            Err(err) => vec![format!("failed to restart '{name}': {err}")],
        }
    }

    /// Sentinel service name expanded to every declared service.
    pub const ALL: &'static str = "ALL";

    /// Returns the status of `name`, or of every declared service if
    /// `name` is [`Engine::ALL`].
    pub fn status(&mut self, name: &str) -> BTreeMap<String, String> {
        let names: Vec<String> = if name == Self::ALL {
            self.config.service_names()
        } else {
            vec![name.to_string()]
        };

        let mut out = BTreeMap::new();
        for service_name in names {
            let status = self.service_status(&service_name);
            out.insert(service_name, status);
        }
        out
    }

    fn service_status(&mut self, name: &str) -> String {
        if !self.config.has_service(name) {
            return "UNKNOWN_SERVICE".to_string();
        }

        match self.services.get_mut(name) {
            Some(service) if service.is_running() => "RUNNING".to_string(),
            Some(_) => "STOPPED".to_string(),
            None => "NOT_STARTED".to_string(),
        }
    }

    /// Advances every service's state machine one step. Called once
    /// per event-loop tick after I/O readiness has been drained.
    pub fn tend_all(&mut self) {
        for service in self.services.values_mut() {
            service.tend();
        }
    }

    /// Kills every service with a live child. Called on daemon exit,
    /// normal or abnormal.
    pub fn shutdown(&mut self) {
        for service in self.services.values_mut() {
            if service.is_running() {
                info!(service = service.name(), "killing on shutdown");
                service.kill();
            } else {
                warn!(service = service.name(), "not running at shutdown");
            }
        }
    }

    /// Set of declared service names that have a live service record
    /// (i.e. have been started at least once). Exposed for tests.
    #[cfg(test)]
    pub fn known_names(&self) -> HashSet<String> {
        self.services.keys().cloned().collect()
    }
}
