//! Configuration file loading.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rfdlink_engine::{CommandConfig, ImageConfig};
use rfdlink_runner::{GroundConfig, RunnerError};

#[test]
fn test_partial_file_keeps_defaults() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("ground.yaml");
    fs::write(
        &path,
        "serial:\n  port: /dev/ttyUSB1\n  baud_rate: 57600\nimage:\n  ping_count: 3\n  image_dir: flight\n",
    )
    .expect("write config");

    let config = GroundConfig::load(&path).expect("config should load");

    assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyUSB1"));
    assert_eq!(config.serial.read_timeout_ms, 1_000);
    assert_eq!(config.command, CommandConfig::default());
    assert_eq!(config.image.ping_count, 3);
    assert_eq!(config.image.image_dir, PathBuf::from("flight"));
    assert_eq!(config.image.chunk_size, ImageConfig::default().chunk_size);

    let settings = config.port_settings(None).expect("port configured");
    assert_eq!(settings.baud_rate, 57_600);
    assert_eq!(settings.read_timeout, Duration::from_secs(1));
}

#[test]
fn test_round_trip_through_yaml() {
    let mut config = GroundConfig::default();
    config.command.retry_interval_ms = 200;
    config.image.ack_deadline_ms = 4_000;

    let yaml = serde_yaml::to_string(&config).expect("serialize");
    let parsed = GroundConfig::from_yaml_str(&yaml).expect("parse");

    assert_eq!(parsed, config);
    assert_eq!(parsed.command.retry_interval(), Duration::from_millis(200));
}

#[test]
fn test_load_errors() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let missing = tmp.path().join("missing.yaml");
    assert!(matches!(
        GroundConfig::load(&missing),
        Err(RunnerError::ConfigRead { .. })
    ));

    let bad = tmp.path().join("bad.yaml");
    fs::write(&bad, "serial:\n  baud_rate: fast\n").expect("write config");
    assert!(matches!(
        GroundConfig::load(&bad),
        Err(RunnerError::ConfigParse(_))
    ));
}
