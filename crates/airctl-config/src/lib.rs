//! Configuration for airctl.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `airctl_core::ClientConfig`. The CLI layers its
//! flag overrides on top of what this crate produces.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use airctl_api::{TlsMode, TransportConfig};
use airctl_core::ClientConfig;
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "airctl";

/// Schemes the transport can speak.
const SUPPORTED_SCHEMES: [&str; 5] = ["mqtt", "tcp", "mqtts", "ssl", "wss"];

/// Shortest keep-alive accepted from a profile.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named broker profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: explicit choice, then `default_profile`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownProfile {
            name: name.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Correlated request timeout, milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_request_timeout_ms() -> u64 {
    8000
}

/// A named broker profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Broker URL, e.g. `wss://broker.example.com:8884/mqtt`.
    pub broker: String,

    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name holding the password.
    pub password_env: Option<String>,

    /// PEM file with a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Client id prefix; a random suffix is appended per session.
    pub client_id_prefix: Option<String>,

    pub keep_alive_secs: Option<u64>,

    /// Overrides `defaults.request_timeout_ms`.
    pub request_timeout_ms: Option<u64>,

    pub reconnect_delay_secs: Option<u64>,

    /// Offline queue capacity. `0` = unbounded.
    pub queue_limit: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "airctl", "airctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("airctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine), then `AIRCTL_*` env overrides.
///
/// Nested keys use a double underscore:
/// `AIRCTL_PROFILES__HOME__BROKER=mqtts://...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("AIRCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Falling back to default config");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Username from the profile, else `AIRCTL_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var("AIRCTL_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the broker password.
///
/// Order: the profile's `password_env` variable, `AIRCTL_PASSWORD`, the
/// system keyring, then plaintext in the profile.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        keyring_password,
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(pw) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(pw));
    }

    // 2. Global env var
    if let Some(pw) = env("AIRCTL_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Some(pw) = keyring(profile_name) {
        return Ok(SecretString::from(pw));
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

fn keyring_password(profile_name: &str) -> Option<String> {
    match keyring_entry(profile_name).and_then(|entry| entry.get_password()) {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            tracing::debug!(profile = profile_name, error = %e, "Keyring lookup failed");
            None
        }
    }
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

// ── Translation to runtime config ───────────────────────────────────

/// Parse and check a broker URL.
pub fn parse_broker(raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|e| ConfigError::Validation {
        field: "broker".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::Validation {
            field: "broker".into(),
            reason: format!(
                "unsupported scheme '{}' (expected mqtt, mqtts or wss)",
                url.scheme()
            ),
        });
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Validation {
            field: "broker".into(),
            reason: format!("'{raw}' has no host"),
        });
    }
    Ok(url)
}

/// Build a `ClientConfig` from a profile, resolving credentials.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;
    build_client_config(profile, defaults, username, password)
}

/// Build a `ClientConfig` from a profile with credentials already resolved.
pub fn build_client_config(
    profile: &Profile,
    defaults: &Defaults,
    username: String,
    password: SecretString,
) -> Result<ClientConfig, ConfigError> {
    let broker = parse_broker(&profile.broker)?;
    let mut transport = TransportConfig::new(broker, username, password);

    if let Some(ref ca) = profile.ca_cert {
        transport.tls = TlsMode::CustomCa(ca.clone());
    }
    if let Some(ref prefix) = profile.client_id_prefix {
        if prefix.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "client_id_prefix".into(),
                reason: "must not be empty".into(),
            });
        }
        transport.client_id_prefix.clone_from(prefix);
    }
    if let Some(secs) = profile.keep_alive_secs {
        if secs < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::Validation {
                field: "keep_alive_secs".into(),
                reason: format!("must be at least {MIN_KEEP_ALIVE_SECS}"),
            });
        }
        transport.keep_alive = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.reconnect_delay_secs {
        transport.reconnect_delay = Duration::from_secs(secs.max(1));
    }
    if let Some(limit) = profile.queue_limit {
        transport.queue_limit = NonZeroUsize::new(limit);
    }

    let timeout_ms = profile.request_timeout_ms.unwrap_or(defaults.request_timeout_ms);
    if timeout_ms == 0 {
        return Err(ConfigError::Validation {
            field: "request_timeout_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(ClientConfig::new(transport).with_request_timeout(Duration::from_millis(timeout_ms)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile(broker: &str) -> Profile {
        Profile {
            broker: broker.into(),
            username: Some("remote".into()),
            password: Some("plain".into()),
            ..Profile::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn password_env_wins_over_everything() {
        let mut p = profile("mqtt://x");
        p.password_env = Some("MY_PW".into());

        let pw = resolve_password_with(
            &p,
            "home",
            |name| match name {
                "MY_PW" => Some("from-profile-env".into()),
                "AIRCTL_PASSWORD" => Some("from-global-env".into()),
                _ => None,
            },
            |_| Some("from-keyring".into()),
        )
        .unwrap();
        assert_eq!(pw.expose_secret(), "from-profile-env");
    }

    #[test]
    fn keyring_beats_plaintext() {
        let p = profile("mqtt://x");
        let pw = resolve_password_with(&p, "home", no_env, |name| {
            (name == "home").then(|| "from-keyring".to_string())
        })
        .unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_with(&p, "other", no_env, |_| None).unwrap();
        assert_eq!(pw.expose_secret(), "plain");
    }

    #[test]
    fn missing_password_is_reported_per_profile() {
        let mut p = profile("mqtt://x");
        p.password = None;
        let err = resolve_password_with(&p, "home", no_env, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { profile } if profile == "home"));
    }

    #[test]
    fn broker_scheme_and_host_are_checked() {
        assert!(parse_broker("wss://broker.example.com:8884/mqtt").is_ok());
        assert!(parse_broker("mqtts://broker.example.com").is_ok());
        assert!(matches!(
            parse_broker("https://broker.example.com"),
            Err(ConfigError::Validation { field, .. }) if field == "broker"
        ));
        assert!(parse_broker("not a url").is_err());
    }

    #[test]
    fn profile_overrides_flow_into_client_config() {
        let mut p = profile("mqtts://broker.local");
        p.ca_cert = Some("/etc/airctl/ca.pem".into());
        p.client_id_prefix = Some("kitchen".into());
        p.keep_alive_secs = Some(60);
        p.reconnect_delay_secs = Some(2);
        p.queue_limit = Some(0);
        p.request_timeout_ms = Some(3000);

        let cfg = build_client_config(
            &p,
            &Defaults::default(),
            "remote".into(),
            SecretString::from("pw".to_string()),
        )
        .unwrap();

        assert_eq!(cfg.request_timeout, Duration::from_millis(3000));
        assert_eq!(cfg.transport.tls, TlsMode::CustomCa("/etc/airctl/ca.pem".into()));
        assert_eq!(cfg.transport.client_id_prefix, "kitchen");
        assert_eq!(cfg.transport.keep_alive, Duration::from_secs(60));
        assert_eq!(cfg.transport.reconnect_delay, Duration::from_secs(2));
        assert_eq!(cfg.transport.queue_limit, None);
    }

    #[test]
    fn defaults_apply_when_profile_is_silent() {
        let cfg = build_client_config(
            &profile("mqtt://broker.local"),
            &Defaults::default(),
            "remote".into(),
            SecretString::from("pw".to_string()),
        )
        .unwrap();

        assert_eq!(cfg.request_timeout, Duration::from_millis(8000));
        assert_eq!(cfg.transport.reconnect_delay, Duration::from_secs(5));
        assert_eq!(cfg.transport.queue_limit.map(NonZeroUsize::get), Some(1024));
        assert_eq!(cfg.transport.tls, TlsMode::System);
    }

    #[test]
    fn zero_timeout_and_tiny_keep_alive_are_rejected() {
        let mut p = profile("mqtt://broker.local");
        p.request_timeout_ms = Some(0);
        let err = build_client_config(
            &p,
            &Defaults::default(),
            "u".into(),
            SecretString::from(String::new()),
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { field, .. } if field == "request_timeout_ms")
        );

        let mut p = profile("mqtt://broker.local");
        p.keep_alive_secs = Some(1);
        let err = build_client_config(
            &p,
            &Defaults::default(),
            "u".into(),
            SecretString::from(String::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "keep_alive_secs"));
    }

    #[test]
    fn active_profile_falls_back_to_default() {
        let cfg = Config::default();
        assert_eq!(cfg.active_profile_name(None), "default");
        assert_eq!(cfg.active_profile_name(Some("attic")), "attic");
        assert!(matches!(cfg.profile("attic"), Err(ConfigError::UnknownProfile { .. })));
    }
}
