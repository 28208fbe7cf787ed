use assert_cmd::Command;
use predicates::prelude::*;

/// Binary command with config writes isolated to a throwaway home
fn tuberip(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tuberip").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"));
    cmd
}

#[test]
fn platforms_lists_supported_sources() {
    let home = tempfile::tempdir().unwrap();
    tuberip(&home)
        .arg("--quiet")
        .arg("platforms")
        .assert()
        .success()
        .stdout(predicate::str::contains("YouTube"))
        .stdout(predicate::str::contains("Direct audio/video URLs"));
}

#[test]
fn help_mentions_serve_and_convert() {
    let home = tempfile::tempdir().unwrap();
    tuberip(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn convert_rejects_invalid_urls() {
    let home = tempfile::tempdir().unwrap();
    tuberip(&home)
        .arg("--quiet")
        .arg("convert")
        .arg("not-a-url")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL format"));
}

#[test]
fn config_show_prints_defaults() {
    let home = tempfile::tempdir().unwrap();
    tuberip(&home)
        .arg("--quiet")
        .arg("config")
        .arg("--show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Default Quality: 192k"));
}
