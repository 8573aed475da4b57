//! Translation from config file + global flags to a `ClientConfig`.

use airctl_config::{Config, Profile};
use airctl_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Profile selected by `--profile`, else the configured default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.active_profile_name(global.profile.as_deref())
}

/// Build the client configuration for the active profile with flag overrides.
///
/// Without a matching profile, `--broker` alone is enough: credentials then
/// come from the environment or keyring.
pub fn client_config(global: &GlobalOpts, cfg: &Config) -> Result<ClientConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);
    let profile = effective_profile(global, cfg, &profile_name)?;
    Ok(airctl_config::profile_to_client_config(
        &profile,
        &profile_name,
        &cfg.defaults,
    )?)
}

fn effective_profile(
    global: &GlobalOpts,
    cfg: &Config,
    profile_name: &str,
) -> Result<Profile, CliError> {
    let mut profile = match cfg.profiles.get(profile_name) {
        Some(profile) => profile.clone(),
        None if global.broker.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name.to_owned(),
                available: available_profiles(cfg),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: airctl_config::config_path().display().to_string(),
            });
        }
    };

    if let Some(ref broker) = global.broker {
        profile.broker.clone_from(broker);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(secs) = global.timeout {
        profile.request_timeout_ms = Some(secs.saturating_mul(1000));
    }
    Ok(profile)
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
