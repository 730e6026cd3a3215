//! CLI integration tests

use std::path::Path;
use std::process::Command;

fn micrec_bin(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_micrec"));
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("MICREC_OUTPUT_DIR");
    cmd
}

#[test]
fn help_output() {
    let home = tempfile::tempdir().unwrap();
    let output = micrec_bin(home.path())
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("M4A"));
    assert!(stdout.contains("--duration"));
    assert!(stdout.contains("--output-dir"));
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("--encode"));
    assert!(stdout.contains("--gain"));
    assert!(stdout.contains("--bit-rate"));
}

#[test]
fn version_output() {
    let home = tempfile::tempdir().unwrap();
    let output = micrec_bin(home.path())
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("micrec"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn config_path_command() {
    let home = tempfile::tempdir().unwrap();
    let output = micrec_bin(home.path())
        .args(["config", "path"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("micrec"));
    assert!(stdout.contains("config.toml"));
}

#[test]
fn config_help() {
    let home = tempfile::tempdir().unwrap();
    let output = micrec_bin(home.path())
        .args(["config", "--help"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("init"));
    assert!(stdout.contains("set"));
    assert!(stdout.contains("get"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("path"));
}

#[test]
fn encode_help() {
    let home = tempfile::tempdir().unwrap();
    let output = micrec_bin(home.path())
        .args(["encode", "--help"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("WAV"));
    assert!(stdout.contains("--output-dir"));
}

#[test]
fn config_set_then_get() {
    let home = tempfile::tempdir().unwrap();
    let set = micrec_bin(home.path())
        .args(["config", "set", "channels", "2"])
        .output()
        .expect("Failed to execute command");
    assert!(set.status.success());

    let get = micrec_bin(home.path())
        .args(["config", "get", "channels"])
        .output()
        .expect("Failed to execute command");
    assert!(get.status.success());
    assert_eq!(String::from_utf8_lossy(&get.stdout).trim(), "stereo");

    let saved = std::fs::read_to_string(home.path().join("micrec/config.toml")).unwrap();
    assert!(saved.contains("channels = \"stereo\""));
}

#[test]
fn config_list_with_no_file() {
    let home = tempfile::tempdir().unwrap();
    let output = micrec_bin(home.path())
        .args(["config", "list"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sample_rate"));
    assert!(stdout.contains("(not set)"));
}
