//! Config subcommand handlers.

use airctl_config::Config;
use dialoguer::{Confirm, Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::active_profile_name;
use crate::error::CliError;
use crate::output;

use super::util;

const REDACTED: &str = "********";

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Path => {
            output::print_output(&airctl_config::config_path().display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(airctl_config::load_config()?);
            let rendered = output::render_single(
                &global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_default(),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = airctl_config::load_config_or_default();
            let profile_name = active_profile_name(global, &cfg);
            let password = rpassword::prompt_password(format!("Password for '{profile_name}': "))
                .map_err(prompt_err)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "password cannot be empty".into(),
                });
            }
            airctl_config::store_password(&profile_name, &password)?;
            util::note(
                &format!("✓ Password stored in system keyring for profile '{profile_name}'"),
                global.quiet,
            );
            Ok(())
        }
    }
}

/// Plaintext passwords never leave `config show`.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
    }
    cfg
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = airctl_config::load_config_or_default();
    eprintln!("airctl configuration wizard");
    eprintln!("   Config path: {}\n", airctl_config::config_path().display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(active_profile_name(global, &cfg))
        .interact_text()
        .map_err(prompt_err)?;

    let broker: String = Input::new()
        .with_prompt("Broker URL")
        .default("mqtts://localhost:8883".into())
        .validate_with(|raw: &String| {
            airctl_config::parse_broker(raw)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Username")
        .interact_text()
        .map_err(prompt_err)?;

    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if username.is_empty() || password.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }

    let store_choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let store_selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(store_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let plaintext = if store_selection == 0 {
        airctl_config::store_password(&profile_name, &password)?;
        eprintln!("   ✓ Password stored in system keyring");
        None
    } else {
        Some(password)
    };

    let mut profile = cfg.profiles.get(&profile_name).cloned().unwrap_or_default();
    profile.broker = broker;
    profile.username = Some(username);
    profile.password = plaintext;
    cfg.profiles.insert(profile_name.clone(), profile);

    let is_default = cfg.default_profile.as_deref() == Some(profile_name.as_str());
    if !is_default {
        let make_default = Confirm::new()
            .with_prompt(format!("Make '{profile_name}' the default profile?"))
            .default(cfg.profiles.len() == 1)
            .interact()
            .map_err(prompt_err)?;
        if make_default {
            cfg.default_profile = Some(profile_name.clone());
        }
    }

    let path = airctl_config::save_config(&cfg)?;
    eprintln!("\n   ✓ Profile '{profile_name}' saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use airctl_config::Profile;

    use super::*;

    #[test]
    fn show_never_prints_plaintext_passwords() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                broker: "mqtts://broker.local".into(),
                password: Some("hunter2".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                broker: "mqtt://10.0.0.5".into(),
                password_env: Some("LAB_PW".into()),
                ..Profile::default()
            },
        );

        let shown = redacted(cfg);
        assert_eq!(shown.profiles["home"].password.as_deref(), Some(REDACTED));
        assert_eq!(shown.profiles["lab"].password, None);
        assert_eq!(shown.profiles["lab"].password_env.as_deref(), Some("LAB_PW"));
    }
}
