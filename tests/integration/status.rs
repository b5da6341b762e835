//! End-to-end `status` queries against a live daemon.
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

fn locald_ini(dir: &Path) -> String {
    format!(
        "[locald]\nsocket_path = {socket}\npid_path = {pid}\n\n[db]\nservice_path = db.ini\n\n[web]\nservice_path = web.ini\n",
        socket = dir.join("locald.sock").display(),
        pid = dir.join("locald.pid").display(),
    )
}

#[test]
fn status_all_reports_every_declared_service() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "db.ini", "[service]\ncommand = /bin/sleep 3600\n");
    write(dir.path(), "web.ini", "[service]\ncommand = /bin/sleep 3600\n");
    let contents = locald_ini(dir.path());
    write(dir.path(), "locald.ini", &contents);
    let config_path = dir.path().join("locald.ini");

    let _daemon = spawn_daemon(&config_path);
    wait_for_socket(&dir.path().join("locald.sock"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "status", "ALL"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("db: NOT_STARTED").and(predicate::str::contains("web: NOT_STARTED")),
        );

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "start", "db"])
        .assert()
        .success();

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "status", "db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db: RUNNING"));
}

#[test]
fn status_accepts_a_comma_separated_list_with_all() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "db.ini", "[service]\ncommand = /bin/sleep 3600\n");
    write(dir.path(), "web.ini", "[service]\ncommand = /bin/sleep 3600\n");
    let contents = locald_ini(dir.path());
    write(dir.path(), "locald.ini", &contents);
    let config_path = dir.path().join("locald.ini");

    let _daemon = spawn_daemon(&config_path);
    wait_for_socket(&dir.path().join("locald.sock"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "start", "db"])
        .assert()
        .success();

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "status", "web,ALL"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db: RUNNING").and(predicate::str::contains("web: NOT_STARTED")));
}

#[test]
fn status_of_unknown_service_is_unknown_service() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "db.ini", "[service]\ncommand = /bin/sleep 3600\n");
    write(dir.path(), "web.ini", "[service]\ncommand = /bin/sleep 3600\n");
    let contents = locald_ini(dir.path());
    write(dir.path(), "locald.ini", &contents);
    let config_path = dir.path().join("locald.ini");

    let _daemon = spawn_daemon(&config_path);
    wait_for_socket(&dir.path().join("locald.sock"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "status", "nope"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nope: UNKNOWN_SERVICE"));
}
