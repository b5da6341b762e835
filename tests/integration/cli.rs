//! End-to-end `localctl` CLI behavior: server lifecycle and exit codes.
use std::{path::Path, process::Command, time::Duration};

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn locald_ini(dir: &Path) -> String {
    format!(
        "[locald]\nsocket_path = {socket}\npid_path = {pid}\n",
        socket = dir.join("locald.sock").display(),
        pid = dir.join("locald.pid").display(),
    )
}

#[test]
fn server_status_reports_not_running_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();
    let contents = locald_ini(dir.path());
    write(dir.path(), "locald.ini", &contents);
    let config_path = dir.path().join("locald.ini");

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "server-status"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("daemon NOT running"));
}

#[test]
fn logs_reports_nothing_to_tail_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();
    let contents = locald_ini(dir.path());
    write(dir.path(), "locald.ini", &contents);
    let config_path = dir.path().join("locald.ini");

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "logs", "web"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("no logs to tail"));
}

#[test]
fn server_start_then_server_wait_then_server_stop() {
    let dir = tempfile::tempdir().unwrap();
    let contents = locald_ini(dir.path());
    write(dir.path(), "locald.ini", &contents);
    let config_path = dir.path().join("locald.ini");

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "server-start", "--no-daemonize"])
        .spawn()
        .expect("failed to spawn localctl server-start");

    // server-start --no-daemonize runs in the foreground of the spawned
    // process; server-wait polls for its pid/socket from this one.
    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "server-wait", "--timeout", "10"])
        .assert()
        .success();

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "server-status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon is running"));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "server-stop"])
        .assert()
        .success();

    std::thread::sleep(Duration::from_millis(300));

    Command::cargo_bin("localctl")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap(), "server-status"])
        .assert()
        .failure()
        .code(1);
}
