//! Exit codes and messages for failing invocations

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn micrec(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("micrec").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("MICREC_OUTPUT_DIR");
    cmd
}

#[test]
fn invalid_duration_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .args(["-d", "ten seconds"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid duration"));
}

#[test]
fn unsupported_sample_rate_creates_nothing() {
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("out");
    micrec(home.path())
        .args(["-r", "7000", "-o"])
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("7000"));
    assert!(!out.exists());
}

#[test]
fn gain_above_max_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let out = home.path().join("out");
    micrec(home.path())
        .args(["-g", "99", "-o"])
        .arg(&out)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid gain 99"));
    assert!(!out.exists());
}

#[test]
fn unknown_format_value_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .args(["--format", "flac"])
        .assert()
        .code(2);
}

#[test]
fn config_get_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .args(["config", "get", "api_key"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown key"));
}

#[test]
fn config_set_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .args(["config", "set", "api_key", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Valid keys"));
    assert!(!home.path().join("micrec/config.toml").exists());
}

#[test]
fn config_set_invalid_gain() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .args(["config", "set", "gain", "41"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gain"));
}

#[test]
fn config_set_invalid_channels() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .args(["config", "set", "channels", "surround"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("channels"));
}

#[test]
fn encode_missing_input_fails() {
    let home = tempfile::tempdir().unwrap();
    micrec(home.path())
        .arg("encode")
        .arg(home.path().join("missing.wav"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read input audio"));
}

#[test]
fn encode_writes_m4a_next_to_wav() {
    let home = tempfile::tempdir().unwrap();
    let wav = home.path().join("tone.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
    for i in 0..22050u32 {
        let t = i as f32 / 22050.0;
        writer
            .write_sample(((t * 330.0 * std::f32::consts::TAU).sin() * 8000.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();

    micrec(home.path())
        .arg("encode")
        .arg(&wav)
        .args(["-b", "64000"])
        .assert()
        .success()
        .stderr(predicate::str::contains("tone.m4a"));

    let m4a = home.path().join("tone.m4a");
    assert!(std::fs::metadata(&m4a).unwrap().len() > 0);
}
