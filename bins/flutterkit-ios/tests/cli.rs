use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn flutterkit_ios() -> Command {
    Command::cargo_bin("flutterkit-ios").unwrap()
}

fn flutter_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("lib")).unwrap();
    std::fs::write(temp.path().join("lib/main.dart"), "void main() {}\n").unwrap();
    temp
}

#[test]
fn test_help_lists_subcommands() {
    flutterkit_ios()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("simulator"))
        .stdout(predicate::str::contains("devices"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn test_build_rejects_unknown_install_mode() {
    flutterkit_ios()
        .args(["build", "--install", "testflight"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[cfg(not(target_os = "macos"))]
#[test]
fn test_build_needs_macos() {
    let project = flutter_project();
    flutterkit_ios()
        .current_dir(project.path())
        .args(["--no-color", "build"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("only available on macOS"));

    let logged = std::fs::read_dir(project.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("ios_build_error_log_"));
    assert!(logged);
}

#[cfg(not(target_os = "macos"))]
#[test]
fn test_devices_needs_macos() {
    flutterkit_ios()
        .args(["--no-color", "devices"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("only available on macOS"));
}

#[test]
fn test_clean_outside_flutter_project() {
    let temp = TempDir::new().unwrap();
    flutterkit_ios()
        .current_dir(temp.path())
        .args(["--no-color", "clean"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not look like a Flutter project"));
}

#[test]
fn test_doctor_json() {
    let temp = TempDir::new().unwrap();
    flutterkit_ios()
        .current_dir(temp.path())
        .args(["doctor", "--json"])
        .assert()
        .stdout(predicate::str::contains("\"xcodebuild\""))
        .stdout(predicate::str::contains("\"pod\""))
        .stdout(predicate::str::contains("\"pub-cache\""));
}
