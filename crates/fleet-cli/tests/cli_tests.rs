//! Exit codes and stream usage of the fleet-cli binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// fleet-cli with an empty environment and a private config directory
fn fleet_cli(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fleet-cli").unwrap();
    cmd.env_clear()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .arg("--no-color");
    cmd
}

fn malformed_config(home: &TempDir) -> std::path::PathBuf {
    let path = home.path().join("broken.toml");
    std::fs::write(&path, "[tools\nbaud = ").unwrap();
    path
}

#[test]
fn test_version_needs_no_environment() {
    let home = TempDir::new().unwrap();

    fleet_cli(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fleet CLI"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_ignores_malformed_config() {
    let home = TempDir::new().unwrap();
    let config = malformed_config(&home);

    fleet_cli(&home)
        .env("FLEET_CONFIG", &config)
        .arg("version")
        .assert()
        .success();
}

#[test]
fn test_missing_environment_exits_1() {
    let home = TempDir::new().unwrap();

    fleet_cli(&home)
        .arg("classes")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("FG_AUTOMATION_URL"))
        .stderr(predicate::str::contains("FG_AUTOMATION_TOKEN"));
}

#[test]
fn test_malformed_config_fails_backend_commands() {
    let home = TempDir::new().unwrap();
    let config = malformed_config(&home);

    fleet_cli(&home)
        .env("FLEET_CONFIG", &config)
        .arg("classes")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_provision_keeps_stdout_for_the_serial() {
    let home = TempDir::new().unwrap();

    // Nothing listens on port 1, so the pipeline fails at login
    fleet_cli(&home)
        .env("FG_AUTOMATION_URL", "http://127.0.0.1:1")
        .env("FG_AUTOMATION_TOKEN", "token")
        .env("FG_API_URL", "https://api.example.com")
        .env("FG_MQTT_HOST", "mqtt.example.com")
        .env("FG_MQTT_PORT", "8883")
        .env("SERIAL_DEVICE", "/dev/ttyUSB3")
        .args(["provision", "grow-v1", "grow"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "Provisioning grow device of class grow-v1 on /dev/ttyUSB3",
        ));
}
