use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn flutterkit_build() -> Command {
    Command::cargo_bin("flutterkit-build").unwrap()
}

#[test]
fn test_help_lists_flags() {
    flutterkit_build()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--platform"))
        .stdout(predicate::str::contains("--fast-build"))
        .stdout(predicate::str::contains("--no-clean"));
}

#[test]
fn test_version() {
    flutterkit_build()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_rejects_unknown_platform() {
    flutterkit_build()
        .args(["--platform", "windows"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_outside_flutter_project_fails_and_logs() {
    let temp = TempDir::new().unwrap();
    flutterkit_build()
        .current_dir(temp.path())
        .args(["--no-color", "--platform", "android"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not look like a Flutter project"));

    let logs: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("build_error_log_"))
        .collect();
    assert_eq!(logs.len(), 1);
}

#[test]
fn test_missing_config_file_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("lib")).unwrap();
    std::fs::write(temp.path().join("lib/main.dart"), "void main() {}\n").unwrap();
    flutterkit_build()
        .current_dir(temp.path())
        .args(["--no-color", "--config", "missing.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}
