//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

/// `ActualValues` #1: angle 90, speed 30, torque -2.
const ACTUAL_VALUES: &str = "F0 81 21 81 5D 01 3C 00 5A 00 1E FF FE 0F";

/// `Watchdog` #0, the shortest possible packet.
const WATCHDOG: &str = "F0 81 49 81 57 00 04 0F";

/// `StimulationError` #2 with code -2.
const ELECTRODE_ERROR: &str = "F0 81 A7 81 56 02 26 FE 0F";

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("rehastim")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rehastim"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rehastim"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn decode_prints_telemetry() {
    let mut cmd = cli_cmd();
    cmd.args(["decode", ACTUAL_VALUES])
        .assert()
        .success()
        .stdout(predicate::str::contains("ActualValues"))
        .stdout(predicate::str::contains("\"speed\":30"));
}

#[test]
fn decode_json_returns_every_packet() {
    let stream = format!("AA BB {WATCHDOG} {ACTUAL_VALUES} {ELECTRODE_ERROR}");
    let output = cli_cmd()
        .args(["decode", "--json", &stream])
        .output()
        .expect("command should execute");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let packets = parsed.as_array().expect("JSON array");
    assert_eq!(packets.len(), 3);
    assert_eq!(packets[0]["command"], "Watchdog");
    assert_eq!(packets[1]["detail"]["angle"], 90);
    assert_eq!(packets[1]["detail"]["torque"], -2);
    assert_eq!(packets[2]["detail"]["message"], "Electrode error");
    assert_eq!(packets[2]["detail"]["fatal"], true);
}

#[test]
fn decode_without_packet_fails_with_clean_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["decode", "--json", "00 01 02"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn decode_rejects_bad_hex() {
    let mut cmd = cli_cmd();
    cmd.args(["decode", "F0 8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hex"));
}

#[test]
fn errors_json_lists_both_tables() {
    let output = cli_cmd()
        .args(["errors", "--json"])
        .output()
        .expect("command should execute");
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(parsed["StimulationError"][0]["severity"], "fatal");
    assert_eq!(parsed["MotomedError"][4]["code"], -4);
    assert_eq!(parsed["MotomedError"][4]["severity"], "advisory");
}

#[test]
fn monitor_without_port_fails() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env_remove("REHASTIM_PORT")
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .arg("monitor")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No serial port"));
}

#[test]
fn monitor_with_missing_port_fails() {
    let mut cmd = cli_cmd();
    cmd.args(["-p", "INVALID_PORT_NAME_XYZ", "monitor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_PORT_NAME_XYZ"));
}

#[test]
fn invalid_local_config_is_a_warning() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("rehastim.toml"), "invalid toml [[[").expect("write config");

    let output = cli_cmd()
        .current_dir(dir.path())
        .arg("errors")
        .output()
        .expect("command should execute");
    assert!(output.status.success(), "command should succeed despite config warning");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rehastim.toml"), "should warn about the config file");
}

#[test]
fn completions_exit_zero() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rehastim"));
}

#[test]
fn unknown_command_is_a_usage_error() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2);
}
