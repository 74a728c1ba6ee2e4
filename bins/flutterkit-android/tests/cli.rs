use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn flutterkit_android() -> Command {
    Command::cargo_bin("flutterkit-android").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    flutterkit_android()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("emulator"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn test_subcommand_required() {
    flutterkit_android().assert().failure();
}

#[test]
fn test_build_outside_flutter_project() {
    let temp = TempDir::new().unwrap();
    flutterkit_android()
        .current_dir(temp.path())
        .args(["--no-color", "build", "--debug"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not look like a Flutter project"));

    let logged = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("android_build_error_log_"));
    assert!(logged);
}

#[test]
fn test_missing_project_dir() {
    flutterkit_android()
        .args(["--project-dir", "/nonexistent/flutterkit/app", "emulator", "--list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot enter"));
}

#[test]
fn test_doctor_json() {
    let temp = TempDir::new().unwrap();
    flutterkit_android()
        .current_dir(temp.path())
        .args(["doctor", "--json"])
        .assert()
        .stdout(predicate::str::contains("\"checks\""))
        .stdout(predicate::str::contains("\"android-sdk\""));
}
