//! End-to-end `start`/`stop`/`restart` against a live daemon.
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
fn start_stop_restart_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "db.ini",
        "[service]\ncommand = /bin/sleep 3600\n",
    );
    write(
        dir.path(),
        "web.ini",
        "[service]\ncommand = /bin/sleep 3600\nrequires = db\n",
    );
    write(
        dir.path(),
        "locald.ini",
        &format!(
            "[locald]\nsocket_path = {socket}\npid_path = {pid}\n\n[db]\nservice_path = db.ini\n\n[web]\nservice_path = web.ini\n",
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
        .stdout(predicate::str::contains("started 'db'").and(predicate::str::contains("started 'web'")));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "restart", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("restarted 'web'"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "stop", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kill signal sent to 'web'"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "stop", "nope"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown service 'nope'"));
}
