use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("hn-feeds")
        .expect("binary")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("hn-feeds")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("HN-Feeds"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn config_flag_needs_a_path() {
    Command::cargo_bin("hn-feeds")
        .expect("binary")
        .arg("--config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--config requires a path"));
}

#[test]
fn unknown_argument_is_rejected() {
    Command::cargo_bin("hn-feeds")
        .expect("binary")
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument: --bogus"));
}
