//! Command-line behavior that needs no network.

use assert_cmd::Command;
use predicates::prelude::*;

fn replfs(project: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("replfs").unwrap();
    cmd.current_dir(project).env("RUST_LOG", "error");
    cmd
}

#[test]
fn version_prints_the_crate_version() {
    let dir = tempfile::tempdir().unwrap();
    replfs(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn config_reflects_the_project_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("replfs.toml"),
        "[network]\nport = 46001\n\n[client]\nreplicas = 5\n",
    )
    .unwrap();

    replfs(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 46001"))
        .stdout(predicate::str::contains("replicas = 5"));
}

#[test]
fn explicit_config_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    replfs(dir.path())
        .args(["--config", "nope.toml", "config"])
        .assert()
        .code(1);
}

#[test]
fn server_refuses_an_existing_mount() {
    let dir = tempfile::tempdir().unwrap();
    let mount = dir.path().join("taken");
    std::fs::create_dir(&mount).unwrap();

    replfs(dir.path())
        .args(["server", "--mount"])
        .arg(&mount)
        .assert()
        .code(1);
    assert!(mount.is_dir());
}

#[test]
fn put_of_a_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    replfs(dir.path())
        .args(["put", "missing.txt"])
        .assert()
        .code(1);
}

#[test]
fn drop_percentage_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    replfs(dir.path())
        .args(["server", "--drop", "101"])
        .assert()
        .failure();
}
