//! Smoke tests of the command-line surface.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_flags() {
    Command::cargo_bin("mediascribe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--interactive"))
        .stdout(predicate::str::contains("--list-formats"));
}

#[test]
fn no_sources_without_interactive_is_an_error() {
    Command::cargo_bin("mediascribe")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("SOURCE"));
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("mediascribe")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediascribe"));
}
