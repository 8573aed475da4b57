#![allow(clippy::unwrap_used)]

// Loading and saving TOML config files.

use airctl_config::{Config, Defaults, Profile, load_config_from, save_config_to};
use pretty_assertions::assert_eq;

const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
output = "json"
request_timeout_ms = 5000

[profiles.home]
broker = "wss://broker.example.com:8884/mqtt"
username = "remote"
password_env = "HOME_MQTT_PASSWORD"
queue_limit = 256

[profiles.lab]
broker = "mqtt://10.0.0.5"
username = "lab"
password = "plaintext"
keep_alive_secs = 15
"#;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(cfg.default_profile.as_deref(), Some("default"));
    assert_eq!(cfg.defaults, Defaults::default());
    assert!(cfg.profiles.is_empty());
}

#[test]
fn profiles_are_read_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let cfg = load_config_from(&path).unwrap();

    assert_eq!(cfg.active_profile_name(None), "home");
    assert_eq!(cfg.defaults.output, "json");
    assert_eq!(cfg.defaults.request_timeout_ms, 5000);
    assert_eq!(cfg.defaults.color, "auto");

    let home = cfg.profile("home").unwrap();
    assert_eq!(home.broker, "wss://broker.example.com:8884/mqtt");
    assert_eq!(home.password_env.as_deref(), Some("HOME_MQTT_PASSWORD"));
    assert_eq!(home.queue_limit, Some(256));
    assert_eq!(home.password, None);

    let lab = cfg.profile("lab").unwrap();
    assert_eq!(lab.keep_alive_secs, Some(15));
}

#[test]
fn saved_config_loads_back_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.default_profile = Some("attic".into());
    cfg.profiles.insert(
        "attic".into(),
        Profile {
            broker: "mqtts://broker.local:8883".into(),
            username: Some("remote".into()),
            ca_cert: Some("/etc/airctl/ca.pem".into()),
            request_timeout_ms: Some(10_000),
            ..Profile::default()
        },
    );

    save_config_to(&cfg, &path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[profiles.attic]"));

    assert_eq!(load_config_from(&path).unwrap(), cfg);
}

#[test]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profiles.home\nbroker = ").unwrap();

    assert!(load_config_from(&path).is_err());
}
