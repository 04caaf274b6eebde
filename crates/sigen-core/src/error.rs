// ── Core error types ──
//
// User-facing errors from sigen-core. The `From<sigen_api::Error>` impl
// folds wire-level failures into a smaller set of domain variants; the
// CLI maps these onto diagnostics and exit codes.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Sigenergy cloud at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired and could not be refreshed: {message}")]
    SessionExpired { message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("MQTT stream not connected")]
    StreamNotConnected,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation} (requires {required})")]
    Unsupported { operation: String, required: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Envelope `code`, when the failure came from a non-zero code.
        code: Option<i64>,
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(kind: &str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.to_owned(),
            name: name.into(),
        }
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<sigen_api::Error> for CoreError {
    fn from(err: sigen_api::Error) -> Self {
        match err {
            sigen_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            sigen_api::Error::TokenExpired { message } => CoreError::SessionExpired { message },
            sigen_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            sigen_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sigen_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS: {msg}"),
            },
            sigen_api::Error::Api { status, body, code } => CoreError::Api {
                message: body,
                code,
                status: Some(status),
            },
            sigen_api::Error::Broker(e) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("MQTT broker: {e}"),
            },
            sigen_api::Error::MqttClient(e) => CoreError::Internal(format!("MQTT client: {e}")),
            sigen_api::Error::NotConnected => CoreError::StreamNotConnected,
            sigen_api::Error::CommandBatchTooLarge { len, max } => CoreError::ValidationFailed {
                message: format!("command batch has {len} entries, limit is {max}"),
            },
            sigen_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            sigen_api::Error::Validation { field, reason } => CoreError::ValidationFailed {
                message: format!("{field}: {reason}"),
            },
        }
    }
}
