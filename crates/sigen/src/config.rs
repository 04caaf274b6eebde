//! CLI config layer: shared profiles from `sigen-config` plus the
//! `GlobalOpts`-aware overrides only the CLI knows about.

pub use sigen_config::{Config, Profile, config_path, load_config_or_default, save_config};

use sigen_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Apply flag overrides (flag > env > profile) to a copy of the profile.
fn apply_overrides(profile: &Profile, global: &GlobalOpts) -> Profile {
    let mut profile = profile.clone();
    if let Some(region) = &global.region {
        profile.region.clone_from(region);
    }
    if let Some(base_url) = &global.base_url {
        profile.base_url = Some(base_url.clone());
    }
    if let Some(username) = &global.username {
        profile.username = Some(username.clone());
    }
    if let Some(app_key) = &global.app_key {
        profile.app_key = Some(app_key.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}

/// Translate a profile + global flags into a `ClientConfig`.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<ClientConfig, CliError> {
    let profile = apply_overrides(profile, global);
    Ok(sigen_config::profile_to_client_config(&profile, profile_name)?)
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
///
/// Without a stored profile, `--username` selects password login and
/// `--app-key` selects key login; secrets then come from the environment.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, global);
    }

    if global.profile.is_some() && !cfg.profiles.is_empty() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available.join(", "),
        });
    }

    let auth_mode = if global.app_key.is_some() {
        "key"
    } else if global.username.is_some() {
        "password"
    } else {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    };

    let ad_hoc = Profile {
        region: "eu".into(),
        auth_mode: auth_mode.into(),
        ..Profile::default()
    };
    resolve_profile(&ad_hoc, &profile_name, global)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["sigen"];
        argv.extend_from_slice(args);
        argv.push("station");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_profile_values() {
        let profile = Profile {
            region: "eu".into(),
            auth_mode: "password".into(),
            username: Some("alice".into()),
            password: Some("pw".into()),
            ..Profile::default()
        };
        let opts = global(&["--region", "us", "--timeout", "5", "--username", "bob"]);
        let merged = apply_overrides(&profile, &opts);

        assert_eq!(merged.region, "us");
        assert_eq!(merged.timeout, Some(5));
        assert_eq!(merged.username.as_deref(), Some("bob"));
        assert_eq!(merged.password.as_deref(), Some("pw"));
    }

    #[test]
    fn explicit_profile_wins() {
        let opts = global(&["--profile", "cabin"]);
        assert_eq!(active_profile_name(&opts, &Config::default()), "cabin");
    }
}
