//! Loading the shipped example configuration and legacy JSON files.

use std::path::PathBuf;

use wattmgr::config::WattConfig;
use wattmgr::devices::DutyMode;

const EXAMPLE: &str = include_str!("../config/wattmgr.example.toml");

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("wattmgr-{}-{name}", std::process::id()))
}

#[test]
fn example_config_is_valid() {
    let cfg = WattConfig::from_toml_str(EXAMPLE).expect("example config should parse");
    let errors = cfg.validate();
    assert!(errors.is_empty(), "example config should validate: {errors:?}");

    let modes: Vec<DutyMode> = cfg.outputs.iter().map(|o| o.to_spec().duty).collect();
    assert_eq!(modes[0], DutyMode::Binary);
    assert!(matches!(modes[1], DutyMode::Curve(_)));
    assert_eq!(modes[2], DutyMode::Linear);
    assert_eq!(cfg.timing().alive_interval_ms, 1_800_000);
}

#[test]
fn from_file_dispatches_on_extension() {
    let toml_path = temp_path("cfg.toml");
    let json_path = temp_path("cfg.json");
    std::fs::write(&toml_path, "[mqtt]\nclient_id = \"from-toml\"\n").ok();
    std::fs::write(&json_path, r#"{ "mqtt": { "clientid": "from-json" } }"#).ok();

    let from_toml = WattConfig::from_file(&toml_path).map(|c| c.mqtt.client_id);
    let from_json = WattConfig::from_file(&json_path).map(|c| c.mqtt.client_id);
    std::fs::remove_file(&toml_path).ok();
    std::fs::remove_file(&json_path).ok();

    assert_eq!(from_toml.ok().as_deref(), Some("from-toml"));
    assert_eq!(from_json.ok().as_deref(), Some("from-json"));
}

#[test]
fn missing_file_reports_path() {
    let result = WattConfig::from_file(&temp_path("does-not-exist.toml"));
    let err = result.expect_err("missing file").to_string();
    assert!(err.contains("cannot read"), "unexpected error: {err}");
    assert!(err.contains("does-not-exist.toml"));
}

#[test]
fn duty_fn_with_duty_disabled_is_rejected() {
    let json = r#"{
        "outputs": [
            { "id": "b", "priority": 1, "power": 2.5, "dcEnabled": false, "dcFn": [[0, 0], [100, 2.5]] }
        ]
    }"#;
    let cfg = WattConfig::from_json_str(json).expect("parse");
    let errors = cfg.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "outputs[0].duty_fn");
}
