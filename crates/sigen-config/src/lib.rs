//! Shared configuration for the sigen CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `sigen_core::ClientConfig`. The CLI adds
//! `GlobalOpts`-aware overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sigen_core::{ClientConfig, Credentials, Region, StreamSettings};

const KEYRING_SERVICE: &str = "sigen";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}' ({missing})")]
    NoCredentials { profile: String, missing: String },

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
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Cloud region: "eu", "cn", "apac" or "us".
    #[serde(default = "default_region")]
    pub region: String,

    /// Override for the region's API base URL.
    pub base_url: Option<String>,

    /// Auth mode: "password", "key", or "account".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Account username (password and account modes).
    pub username: Option<String>,

    /// Account password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Northbound app key (key mode, northbound, MQTT).
    pub app_key: Option<String>,

    /// Northbound app secret (plaintext; prefer keyring or env var).
    pub app_secret: Option<String>,

    /// Environment variable name containing the app secret.
    pub app_secret_env: Option<String>,

    /// Extra northbound credentials in password mode: "key" or "account".
    pub northbound: Option<String>,

    /// Systems for northbound calls and the MQTT stream.
    #[serde(default)]
    pub system_ids: Vec<String>,

    /// MQTT broker host override.
    pub mqtt_broker: Option<String>,

    /// MQTT broker port override.
    pub mqtt_port: Option<u16>,

    /// MQTT CA certificate. Enables the stream when set.
    pub mqtt_ca_cert: Option<PathBuf>,

    /// MQTT client certificate (mutual TLS).
    pub mqtt_client_cert: Option<PathBuf>,

    /// MQTT client key (mutual TLS).
    pub mqtt_client_key: Option<PathBuf>,

    /// Extra root CA for the REST API.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

fn default_region() -> String {
    "eu".into()
}
fn default_auth_mode() -> String {
    "password".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "sigen", "sigen").map_or_else(
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
    p.push("sigen");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, merged with `SIGEN_`-prefixed env vars
/// (`__` separates nesting, e.g. `SIGEN_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SIGEN_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Keyring ─────────────────────────────────────────────────────────

fn keyring_entry(profile_name: &str, what: &str) -> Option<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{what}")).ok()
}

/// Store a secret (`"password"` or `"app-secret"`) in the system keyring.
pub fn store_secret(profile_name: &str, what: &str, secret: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{what}"))
        .map_err(|e| keyring_error(what, &e))?;
    entry
        .set_password(secret)
        .map_err(|e| keyring_error(what, &e))
}

fn keyring_error(what: &str, err: &keyring::Error) -> ConfigError {
    ConfigError::Validation {
        field: what.into(),
        reason: format!("keyring: {err}"),
    }
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve a secret through env var → keyring → plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    fallback_env: &str,
    profile_name: &str,
    keyring_key: &str,
    plaintext: Option<&String>,
) -> Option<SecretString> {
    // 1. Profile's env var, then the global one
    for name in env_name.into_iter().chain(std::iter::once(fallback_env)) {
        if let Ok(val) = std::env::var(name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Some(secret) = keyring_entry(profile_name, keyring_key).and_then(|e| e.get_password().ok()) {
        return Some(SecretString::from(secret));
    }

    // 3. Plaintext in config
    plaintext.map(|p| SecretString::from(p.clone()))
}

/// Resolve username + password.
pub fn resolve_account(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let missing = |what: &str| ConfigError::NoCredentials {
        profile: profile_name.into(),
        missing: what.into(),
    };

    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("SIGEN_USERNAME").ok())
        .ok_or_else(|| missing("username"))?;

    let password = resolve_secret(
        profile.password_env.as_deref(),
        "SIGEN_PASSWORD",
        profile_name,
        "password",
        profile.password.as_ref(),
    )
    .ok_or_else(|| missing("password"))?;

    Ok((username, password))
}

/// Resolve app key + app secret.
pub fn resolve_app_key(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let missing = |what: &str| ConfigError::NoCredentials {
        profile: profile_name.into(),
        missing: what.into(),
    };

    let app_key = profile
        .app_key
        .clone()
        .or_else(|| std::env::var("SIGEN_APP_KEY").ok())
        .ok_or_else(|| missing("app_key"))?;

    let app_secret = resolve_secret(
        profile.app_secret_env.as_deref(),
        "SIGEN_APP_SECRET",
        profile_name,
        "app-secret",
        profile.app_secret.as_ref(),
    )
    .ok_or_else(|| missing("app_secret"))?;

    Ok((app_key, app_secret))
}

fn credentials_for_mode(
    mode: &str,
    field: &str,
    profile: &Profile,
    profile_name: &str,
) -> Result<Credentials, ConfigError> {
    match mode {
        "password" => {
            let (username, password) = resolve_account(profile, profile_name)?;
            Ok(Credentials::Password { username, password })
        }
        "key" => {
            let (app_key, app_secret) = resolve_app_key(profile, profile_name)?;
            Ok(Credentials::AppKey {
                app_key,
                app_secret,
            })
        }
        "account" => {
            let (username, password) = resolve_account(profile, profile_name)?;
            Ok(Credentials::Account { username, password })
        }
        other => Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected 'password', 'key', or 'account', got '{other}'"),
        }),
    }
}

/// Resolve the main `Credentials` from a profile's `auth_mode`.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    credentials_for_mode(&profile.auth_mode, "auth_mode", profile, profile_name)
}

/// Resolve extra northbound credentials, if the profile asks for them.
pub fn resolve_northbound(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<Credentials>, ConfigError> {
    match profile.northbound.as_deref() {
        None => Ok(None),
        Some("password") => Err(ConfigError::Validation {
            field: "northbound".into(),
            reason: "northbound calls need 'key' or 'account' credentials".into(),
        }),
        Some(mode) => credentials_for_mode(mode, "northbound", profile, profile_name).map(Some),
    }
}

/// Build a `ClientConfig` from a profile, without CLI flag overrides.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ClientConfig, ConfigError> {
    let region = Region::parse(&profile.region).map_err(|e| ConfigError::Validation {
        field: "region".into(),
        reason: e.to_string(),
    })?;

    let base_url = profile
        .base_url
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>().map_err(|_| ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("invalid URL: {raw}"),
            })
        })
        .transpose()?;

    let auth = resolve_auth(profile, profile_name)?;
    let northbound = resolve_northbound(profile, profile_name)?;

    let stream = profile.mqtt_ca_cert.as_ref().map(|ca| {
        let mut settings = StreamSettings::new(ca.clone());
        settings.broker.clone_from(&profile.mqtt_broker);
        settings.port = profile.mqtt_port;
        settings.system_ids.clone_from(&profile.system_ids);
        settings.client_cert.clone_from(&profile.mqtt_client_cert);
        settings.client_key.clone_from(&profile.mqtt_client_key);
        settings
    });

    let mut config = ClientConfig::new(region, auth);
    config.base_url = base_url;
    config.northbound = northbound;
    config.stream = stream;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout));
    config.ca_cert.clone_from(&profile.ca_cert);
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn profile() -> Profile {
        Profile {
            region: "apac".into(),
            auth_mode: "password".into(),
            username: Some("alice@example.com".into()),
            password: Some("plain-pw".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[profiles.home]
region = "us"
auth_mode = "key"
app_key = "KEY"
system_ids = ["S1", "S2"]
mqtt_ca_cert = "/etc/sigen/ca.pem"
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("home"));
        assert_eq!(config.defaults.output, "table");
        let home = &config.profiles["home"];
        assert_eq!(home.region, "us");
        assert_eq!(home.system_ids, vec!["S1".to_owned(), "S2".to_owned()]);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("default".into(), profile());
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["default"].region, "apac");
    }

    #[test]
    fn plaintext_password_resolves() {
        let mut p = profile();
        p.password_env = Some("SIGEN_TEST_UNSET_PASSWORD_VAR".into());
        let config = profile_to_client_config(&p, "sigen-test-profile").unwrap();

        assert_eq!(config.region, Region::Apac);
        match config.auth {
            Credentials::Password { username, password } => {
                assert_eq!(username, "alice@example.com");
                assert!(!password.expose_secret().is_empty());
            }
            other => panic!("expected password credentials, got {other:?}"),
        }
        assert!(config.stream.is_none());
        assert!(config.northbound.is_none());
    }

    #[test]
    fn unknown_region_and_mode_are_rejected() {
        let mut p = profile();
        p.region = "mars".into();
        assert!(matches!(
            profile_to_client_config(&p, "x"),
            Err(ConfigError::Validation { ref field, .. }) if field == "region"
        ));

        let mut p = profile();
        p.auth_mode = "oauth".into();
        assert!(matches!(
            resolve_auth(&p, "x"),
            Err(ConfigError::Validation { ref field, .. }) if field == "auth_mode"
        ));
    }

    #[test]
    fn northbound_account_reuses_login() {
        let mut p = profile();
        p.northbound = Some("account".into());
        let nb = resolve_northbound(&p, "sigen-test-profile").unwrap();
        assert!(matches!(nb, Some(Credentials::Account { .. })));

        p.northbound = Some("password".into());
        assert!(resolve_northbound(&p, "x").is_err());
    }

    #[test]
    fn stream_settings_follow_ca_cert() {
        let mut p = profile();
        p.mqtt_ca_cert = Some(PathBuf::from("/etc/sigen/ca.pem"));
        p.mqtt_port = Some(1883);
        p.system_ids = vec!["S1".into()];
        let config = profile_to_client_config(&p, "sigen-test-profile").unwrap();

        let stream = config.stream.unwrap();
        assert_eq!(stream.port, Some(1883));
        assert_eq!(stream.system_ids, vec!["S1".to_owned()]);
    }
}
