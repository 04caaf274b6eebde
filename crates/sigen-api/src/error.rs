use thiserror::Error;

/// Top-level error type for the `sigen-api` crate.
///
/// Covers every failure mode across the API surfaces: token issuance,
/// the REST envelope, the northbound endpoints, and the MQTT stream.
/// `sigen-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (bad credentials, malformed login response, `code != 0`).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The refresh-token exchange itself failed. The caller should force
    /// a full re-login.
    #[error("Token expired and refresh failed: {message}")]
    TokenExpired { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS material could not be loaded or the client could not be built.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-auth API failure: HTTP status >= 400, or an envelope whose
    /// `code` is non-zero.
    #[error("API error (HTTP {status}): {body}")]
    Api {
        status: u16,
        body: String,
        code: Option<i64>,
    },

    // ── MQTT ────────────────────────────────────────────────────────
    /// Broker-level failure surfaced by the MQTT event loop.
    #[error("MQTT broker error: {0}")]
    Broker(#[from] rumqttc::ConnectionError),

    /// The MQTT request channel rejected a publish or subscribe.
    #[error("MQTT client error: {0}")]
    MqttClient(#[from] rumqttc::ClientError),

    /// A command was issued while the stream is not in the `Streaming` state.
    #[error("MQTT stream not connected")]
    NotConnected,

    /// Command batch outside the accepted `1..=max` range.
    #[error("Command batch of {len} entries rejected (limit {max})")]
    CommandBatchTooLarge { len: usize, max: usize },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Caller-supplied argument rejected before anything hit the wire.
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl Error {
    /// Returns `true` for any authentication failure, including a failed refresh.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::TokenExpired { .. })
    }

    /// Returns `true` if the refresh exchange failed and a full login is needed.
    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::TokenExpired { .. })
    }

    /// Returns `true` for failures raised by the broker connection itself.
    pub fn is_broker_fault(&self) -> bool {
        matches!(self, Self::Broker(_))
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Broker(_) => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
