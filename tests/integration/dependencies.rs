//! End-to-end dependency resolution: ordering, unknown deps, cycles.
use std::{
    path::Path,
    process::{Child, Command},
    time::Duration,
};

use assert_cmd::prelude::*;
use predicates::prelude::*;

struct Daemon(Child);

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_daemon(config_path: &Path) -> Daemon {
    let child = Command::cargo_bin("locald")
        .unwrap()
        .arg("--config")
        .arg(config_path)
        .arg("--no-daemonize")
        .spawn()
        .expect("failed to spawn locald");
    Daemon(child)
}

fn wait_for_socket(socket_path: &Path) {
    for _ in 0..100 {
        if socket_path.exists() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("daemon did not create control socket in time");
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn starting_with_an_unknown_required_service_aborts() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "web.ini",
        "[service]\ncommand = /bin/sleep 3600\nrequires = missing\n",
    );
    write(
        dir.path(),
        "locald.ini",
        &format!(
            "[locald]\nsocket_path = {socket}\npid_path = {pid}\n\n[web]\nservice_path = web.ini\n",
            socket = dir.path().join("locald.sock").display(),
            pid = dir.path().join("locald.pid").display(),
        ),
    );
    let config_path = dir.path().join("locald.ini");

    let _daemon = spawn_daemon(&config_path);
    wait_for_socket(&dir.path().join("locald.sock"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "start", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown required service 'missing'"));
}

#[test]
fn a_dependency_cycle_is_reported_instead_of_hanging() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a.ini",
        "[service]\ncommand = /bin/sleep 3600\nrequires = b\n",
    );
    write(
        dir.path(),
        "b.ini",
        "[service]\ncommand = /bin/sleep 3600\nrequires = a\n",
    );
    write(
        dir.path(),
        "locald.ini",
        &format!(
            "[locald]\nsocket_path = {socket}\npid_path = {pid}\n\n[a]\nservice_path = a.ini\n\n[b]\nservice_path = b.ini\n",
            socket = dir.path().join("locald.sock").display(),
            pid = dir.path().join("locald.pid").display(),
        ),
    );
    let config_path = dir.path().join("locald.ini");

    let _daemon = spawn_daemon(&config_path);
    wait_for_socket(&dir.path().join("locald.sock"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "start", "a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dependency cycle detected"));
}
