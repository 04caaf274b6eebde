//! Config subcommand handlers.

use dialoguer::{Input, Password, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

const REGIONS: [&str; 4] = ["eu", "cn", "apac", "us"];

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "region = \"{}\"", p.region);
        let _ = writeln!(out, "auth_mode = \"{}\"", p.auth_mode);
        if let Some(ref url) = p.base_url {
            let _ = writeln!(out, "base_url = \"{url}\"");
        }
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref key) = p.app_key {
            let _ = writeln!(out, "app_key = \"{key}\"");
        }
        if p.app_secret.is_some() {
            let _ = writeln!(out, "app_secret = \"****\"");
        }
        if let Some(ref env) = p.app_secret_env {
            let _ = writeln!(out, "app_secret_env = \"{env}\"");
        }
        if let Some(ref nb) = p.northbound {
            let _ = writeln!(out, "northbound = \"{nb}\"");
        }
        if !p.system_ids.is_empty() {
            let ids: Vec<_> = p.system_ids.iter().map(|id| format!("\"{id}\"")).collect();
            let _ = writeln!(out, "system_ids = [{}]", ids.join(", "));
        }
        if let Some(ref broker) = p.mqtt_broker {
            let _ = writeln!(out, "mqtt_broker = \"{broker}\"");
        }
        if let Some(port) = p.mqtt_port {
            let _ = writeln!(out, "mqtt_port = {port}");
        }
        for (key, path) in [
            ("mqtt_ca_cert", &p.mqtt_ca_cert),
            ("mqtt_client_cert", &p.mqtt_client_cert),
            ("mqtt_client_key", &p.mqtt_client_key),
            ("ca_cert", &p.ca_cert),
        ] {
            if let Some(path) = path {
                let _ = writeln!(out, "{key} = \"{}\"", path.display());
            }
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    input.interact_text().map_err(prompt_err)
}

fn prompt_secret(prompt: &str) -> Result<String, CliError> {
    let secret = Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "secret".into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    secret: String,
    profile_name: &str,
    what: &str,
    label: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        sigen_config::store_secret(profile_name, what, &secret)?;
        eprintln!("   ✓ {label} stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(secret))
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

fn not_found(name: String, cfg: &Config) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

/// Apply one `key = value` assignment to a profile.
fn set_profile_value(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "region" => {
            if !REGIONS.contains(&value.as_str()) {
                return Err(CliError::Validation {
                    field: "region".into(),
                    reason: format!("must be one of: {}", REGIONS.join(", ")),
                });
            }
            profile.region = value;
        }
        "base_url" | "base-url" => profile.base_url = Some(value),
        "auth_mode" | "auth-mode" => {
            if !matches!(value.as_str(), "password" | "key" | "account") {
                return Err(CliError::Validation {
                    field: "auth_mode".into(),
                    reason: "must be 'password', 'key', or 'account'".into(),
                });
            }
            profile.auth_mode = value;
        }
        "username" => profile.username = Some(value),
        "password_env" | "password-env" => profile.password_env = Some(value),
        "app_key" | "app-key" => profile.app_key = Some(value),
        "app_secret_env" | "app-secret-env" => profile.app_secret_env = Some(value),
        "northbound" => {
            if !matches!(value.as_str(), "key" | "account") {
                return Err(CliError::Validation {
                    field: "northbound".into(),
                    reason: "must be 'key' or 'account'".into(),
                });
            }
            profile.northbound = Some(value);
        }
        "system_ids" | "system-ids" => {
            profile.system_ids = value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect();
        }
        "mqtt_broker" | "mqtt-broker" => profile.mqtt_broker = Some(value),
        "mqtt_port" | "mqtt-port" => {
            profile.mqtt_port = Some(parse_value("mqtt_port", &value, "a port number")?);
        }
        "mqtt_ca_cert" | "mqtt-ca-cert" => profile.mqtt_ca_cert = Some(value.into()),
        "mqtt_client_cert" | "mqtt-client-cert" => profile.mqtt_client_cert = Some(value.into()),
        "mqtt_client_key" | "mqtt-client-key" => profile.mqtt_client_key = Some(value.into()),
        "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
        "timeout" => {
            profile.timeout = Some(parse_value("timeout", &value, "a number (seconds)")?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: region, base_url, auth_mode, \
                     username, password_env, app_key, app_secret_env, northbound, system_ids, \
                     mqtt_broker, mqtt_port, mqtt_ca_cert, mqtt_client_cert, mqtt_client_key, \
                     ca_cert, timeout"
                ),
            });
        }
    }
    Ok(())
}

fn new_profile() -> Profile {
    Profile {
        region: "eu".into(),
        auth_mode: "password".into(),
        ..Profile::default()
    }
}

// ── Init wizard ─────────────────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("✨ Sigenergy CLI configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name = prompt_text("Profile name", Some("default"))?;

    let region_idx = Select::new()
        .with_prompt("Cloud region")
        .items(&REGIONS)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let auth_choices = &[
        "Account username/password (app API)",
        "Northbound app key/secret (developer API, MQTT stream)",
    ];
    let auth_idx = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = new_profile();
    profile.region = REGIONS.get(region_idx).copied().unwrap_or("eu").into();

    if auth_idx == 0 {
        profile.username = Some(prompt_text("Username", None)?);
        let password = prompt_secret("Password")?;
        profile.password = prompt_keyring_storage(password, &profile_name, "password", "Password")?;
    } else {
        profile.auth_mode = "key".into();
        profile.app_key = Some(prompt_text("App key", None)?);
        let secret = prompt_secret("App secret")?;
        profile.app_secret =
            prompt_keyring_storage(secret, &profile_name, "app-secret", "App secret")?;
    }

    let mut cfg = config::load_config_or_default();
    cfg.default_profile = Some(profile_name.clone());
    cfg.profiles.insert(profile_name.clone(), profile);
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: sigen station");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(new_profile);

            set_profile_value(profile, &key, value)?;
            config::save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: sigen config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(not_found(name, &cfg));
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        ConfigCommand::SetSecret { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            let Some(prof) = cfg.profiles.get(&profile_name) else {
                return Err(not_found(profile_name, &cfg));
            };

            let needs_password = matches!(prof.auth_mode.as_str(), "password" | "account")
                || prof.northbound.as_deref() == Some("account");
            let needs_app_secret =
                prof.auth_mode == "key" || prof.northbound.as_deref() == Some("key");

            if needs_password {
                let secret = prompt_secret("Password")?;
                sigen_config::store_secret(&profile_name, "password", &secret)?;
            }
            if needs_app_secret {
                let secret = prompt_secret("App secret")?;
                sigen_config::store_secret(&profile_name, "app-secret", &secret)?;
            }

            eprintln!("✓ Secret(s) stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_splits_system_ids_and_validates_keys() {
        let mut profile = new_profile();
        set_profile_value(&mut profile, "system_ids", "S1, S2,,".into()).unwrap();
        assert_eq!(profile.system_ids, vec!["S1".to_owned(), "S2".to_owned()]);

        set_profile_value(&mut profile, "mqtt-port", "8883".into()).unwrap();
        assert_eq!(profile.mqtt_port, Some(8883));

        assert!(set_profile_value(&mut profile, "region", "mars".into()).is_err());
        assert!(set_profile_value(&mut profile, "northbound", "password".into()).is_err());
        assert!(set_profile_value(&mut profile, "colour", "red".into()).is_err());
    }

    #[test]
    fn redacted_view_masks_secrets() {
        let mut cfg = Config::default();
        let mut profile = new_profile();
        profile.password = Some("hunter2".into());
        profile.app_secret = Some("s3cret".into());
        cfg.profiles.insert("home".into(), profile);

        let shown = format_config_redacted(&cfg);
        assert!(shown.contains("[profiles.home]"));
        assert!(shown.contains("password = \"****\""));
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("s3cret"));
    }
}
