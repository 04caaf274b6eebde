//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sigen_config::ConfigError;
use sigen_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the Sigenergy cloud at {url}")]
    #[diagnostic(
        code(sigen::connection_failed),
        help(
            "Check your network connection and the profile's region.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("The MQTT stream is not connected")]
    #[diagnostic(
        code(sigen::stream_not_connected),
        help("The broker connection is down or still coming up. Try again with a longer --wait.")
    )]
    StreamNotConnected,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(sigen::auth_failed),
        help(
            "Verify your username/password or app key/secret.\n\
             Run: sigen config set-secret"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}' (missing {missing})")]
    #[diagnostic(
        code(sigen::no_credentials),
        help(
            "Configure credentials with: sigen config init\n\
             Or set SIGEN_USERNAME/SIGEN_PASSWORD or SIGEN_APP_KEY/SIGEN_APP_SECRET."
        )
    )]
    NoCredentials { profile: String, missing: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(sigen::not_found),
        help("Run: sigen {list_command} to see available names")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(sigen::api_error))]
    ApiError { code: String, message: String },

    // ── Unsupported ──────────────────────────────────────────────────

    #[error("Operation '{operation}' is not supported with the current credentials")]
    #[diagnostic(
        code(sigen::unsupported),
        help(
            "This command requires {required}.\n\
             Configure them with: sigen config set northbound key"
        )
    )]
    Unsupported { operation: String, required: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sigen::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sigen::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: sigen config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(sigen::no_config),
        help(
            "Create one with: sigen config init\n\
             Expected at: {path}\n\
             Or pass --username (with SIGEN_PASSWORD) or --app-key (with SIGEN_APP_SECRET)."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(sigen::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out")]
    #[diagnostic(
        code(sigen::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout,

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(sigen::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    #[diagnostic(code(sigen::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamNotConnected => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } | CoreError::SessionExpired { message } => {
                CliError::AuthFailed { message }
            }

            CoreError::Timeout => CliError::Timeout,

            CoreError::StreamNotConnected => CliError::StreamNotConnected,

            CoreError::NotFound { kind, name } => CliError::NotFound {
                list_command: list_command_for(&kind),
                resource_type: kind,
                identifier: name,
            },

            CoreError::Unsupported {
                operation,
                required,
            } => CliError::Unsupported {
                operation,
                required,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api {
                message,
                code,
                status,
            } => CliError::ApiError {
                code: code
                    .map(|c| c.to_string())
                    .or_else(|| status.map(|s| format!("HTTP {s}")))
                    .unwrap_or_else(|| "unknown".into()),
                message,
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

fn list_command_for(kind: &str) -> String {
    if kind.eq_ignore_ascii_case("smart load") {
        "loads list".into()
    } else {
        "modes list".into()
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile, missing } => {
                CliError::NoCredentials { profile, missing }
            }
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
