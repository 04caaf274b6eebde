// Auth session
//
// Drives the three login protocols against the REST auth endpoints,
// populates the token store, and renews the token on demand. Every
// authenticated call goes through `ensure_valid` right before hitting
// the wire; there is no background refresh timer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::token::{TokenState, TokenStore};
use super::{Credentials, Mechanism};
use crate::credential::encode_password;
use crate::error::Error;

const OAUTH_TOKEN_PATH: &str = "auth/oauth/token";
const KEY_LOGIN_PATH: &str = "openapi/auth/login/key";
const ACCOUNT_LOGIN_PATH: &str = "openapi/auth/login/password";

const OAUTH_CLIENT_ID: &str = "sigen";
const OAUTH_CLIENT_SECRET: &str = "sigen";

/// Lifetime assumed when a northbound login omits `expiresIn` (about 12h).
const DEFAULT_EXPIRES_IN_SECS: i64 = 43_199;

// ── Wire shapes ──────────────────────────────────────────────────────

/// `{ "data": { "access_token", "refresh_token", "expires_in" } }`
#[derive(Deserialize)]
struct OAuthEnvelope {
    data: Option<OAuthToken>,
}

#[derive(Deserialize)]
struct OAuthToken {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

/// `{ "code": 0, "msg": "...", "data": "<json string>" | {...} }`
#[derive(Deserialize)]
struct NorthboundEnvelope {
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NorthboundToken {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

// ── AuthSession ──────────────────────────────────────────────────────

/// Token lifecycle for one set of [`Credentials`].
///
/// `Unauthenticated → Authenticated → (stale) → Refreshing → Authenticated | Failed`.
/// Concurrent callers that observe a stale token collapse onto a single
/// in-flight renewal via `renew_gate`.
#[derive(Debug)]
pub struct AuthSession {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    /// Codec output for the password-based mechanisms, computed once.
    encoded_password: Option<String>,
    store: TokenStore,
    renew_gate: Mutex<()>,
}

impl AuthSession {
    /// Build a session. Does NOT log in -- call [`login()`](Self::login)
    /// or let the first [`ensure_valid()`](Self::ensure_valid) do it.
    pub fn new(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        let encoded_password = match &credentials {
            Credentials::Password { password, .. } | Credentials::Account { password, .. } => {
                Some(encode_password(password.expose_secret()))
            }
            Credentials::AppKey { .. } => None,
        };
        let store = TokenStore::new(credentials.mechanism());

        Self {
            http,
            base_url,
            credentials,
            encoded_password,
            store,
            renew_gate: Mutex::new(()),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn mechanism(&self) -> Mechanism {
        self.credentials.mechanism()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Snapshot of the current token state.
    pub fn token_state(&self) -> std::sync::Arc<TokenState> {
        self.store.current()
    }

    // ── Public lifecycle ─────────────────────────────────────────────

    /// Run the configured mechanism's full login and install the result.
    ///
    /// On failure the token store is left exactly as it was.
    pub async fn login(&self) -> Result<(), Error> {
        match &self.credentials {
            Credentials::Password { username, .. } => self.password_grant(username).await,
            Credentials::AppKey {
                app_key,
                app_secret,
            } => {
                let key = STANDARD.encode(format!("{app_key}:{}", app_secret.expose_secret()));
                self.northbound_login(KEY_LOGIN_PATH, &json!({ "key": key }), Mechanism::Key)
                    .await
            }
            Credentials::Account { username, .. } => {
                let body = json!({
                    "username": username,
                    "password": self.encoded_password.as_deref().unwrap_or_default(),
                });
                self.northbound_login(ACCOUNT_LOGIN_PATH, &body, Mechanism::Account)
                    .await
            }
        }
    }

    /// Renew the token.
    ///
    /// Password credentials exchange the stored refresh token; a failed
    /// exchange yields [`Error::TokenExpired`] and leaves the stale state
    /// readable. The northbound mechanisms have no refresh flow and run
    /// the full login again.
    pub async fn refresh(&self) -> Result<(), Error> {
        if !self.mechanism().supports_refresh() {
            return self.login().await;
        }

        let state = self.store.current();
        let refresh_token = state
            .refresh_token
            .as_ref()
            .ok_or_else(|| Error::TokenExpired {
                message: "no refresh token held -- login required".into(),
            })?;

        let url = self.base_url.join(OAUTH_TOKEN_PATH)?;
        debug!("refreshing access token at {}", url);

        let resp = self
            .http
            .post(url)
            .basic_auth(OAUTH_CLIENT_ID, Some(OAUTH_CLIENT_SECRET))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != reqwest::StatusCode::OK {
            return Err(Error::TokenExpired {
                message: format!("refresh rejected (HTTP {status}): {body}"),
            });
        }

        let token = parse_oauth_token(&body).ok_or_else(|| Error::TokenExpired {
            message: format!("unexpected refresh response: {body}"),
        })?;
        let expires_at = expiry_after(token.expires_in).ok_or_else(|| Error::TokenExpired {
            message: format!("refresh returned unusable expires_in: {}", token.expires_in),
        })?;
        self.install_oauth(token, expires_at);
        debug!("access token refreshed");
        Ok(())
    }

    /// Make sure a usable token is installed, renewing it if needed, and
    /// return it.
    pub async fn ensure_valid(&self) -> Result<SecretString, Error> {
        self.ensure_valid_at(Utc::now()).await
    }

    /// [`ensure_valid`](Self::ensure_valid) against an explicit clock reading.
    ///
    /// Renews if and only if the token is absent or `now >= expiry`.
    pub async fn ensure_valid_at(&self, now: DateTime<Utc>) -> Result<SecretString, Error> {
        if let Some(token) = self.valid_token_at(now) {
            return Ok(token);
        }

        let _gate = self.renew_gate.lock().await;

        // Another caller may have renewed while we waited on the gate.
        if let Some(token) = self.valid_token_at(now) {
            return Ok(token);
        }

        let state = self.store.current();
        if state.access_token.is_none() {
            self.login().await?;
        } else if self.mechanism().supports_refresh() {
            debug!("access token stale, refreshing");
            self.refresh().await?;
        } else {
            debug!(mechanism = ?self.mechanism(), "access token stale, logging in again");
            self.login().await?;
        }

        self.store
            .current()
            .access_token
            .clone()
            .ok_or_else(|| Error::Authentication {
                message: "login completed without installing a token".into(),
            })
    }

    // ── Protocols ────────────────────────────────────────────────────

    fn valid_token_at(&self, now: DateTime<Utc>) -> Option<SecretString> {
        let state = self.store.current();
        if state.is_valid_at(now) {
            state.access_token.clone()
        } else {
            None
        }
    }

    /// OAuth password grant: form-encoded credentials + basic client auth.
    async fn password_grant(&self, username: &str) -> Result<(), Error> {
        let url = self.base_url.join(OAUTH_TOKEN_PATH)?;
        debug!("requesting access token at {}", url);

        let resp = self
            .http
            .post(url)
            .basic_auth(OAUTH_CLIENT_ID, Some(OAUTH_CLIENT_SECRET))
            .form(&[
                ("username", username),
                (
                    "password",
                    self.encoded_password.as_deref().unwrap_or_default(),
                ),
                ("grant_type", "password"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Authentication {
                message: format!(
                    "failed to get access token for user '{username}' (HTTP {status}): {body}"
                ),
            });
        }

        let token = parse_oauth_token(&body).ok_or_else(|| Error::Authentication {
            message: format!(
                "failed to get access token for user '{username}': unexpected response: {body}"
            ),
        })?;
        let expires_at = expiry_after(token.expires_in).ok_or_else(|| Error::Authentication {
            message: format!(
                "failed to get access token for user '{username}': unusable expires_in {}",
                token.expires_in
            ),
        })?;
        self.install_oauth(token, expires_at);
        info!(username, "password login successful");
        Ok(())
    }

    /// Northbound login: `{code, msg, data}` where `data` may itself be a
    /// JSON-encoded string.
    async fn northbound_login(
        &self,
        path: &str,
        body: &Value,
        mechanism: Mechanism,
    ) -> Result<(), Error> {
        let url = self.base_url.join(path)?;
        debug!(?mechanism, "northbound login at {}", url);

        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        let envelope: NorthboundEnvelope =
            serde_json::from_str(&text).map_err(|e| Error::Authentication {
                message: format!("northbound login failed (HTTP {status}): {e}: {text}"),
            })?;

        if envelope.code != Some(0) {
            warn!(code = ?envelope.code, "northbound login rejected");
            return Err(Error::Authentication {
                message: format!(
                    "northbound login failed: code={}, msg={}",
                    envelope
                        .code
                        .map_or_else(|| "none".to_owned(), |c| c.to_string()),
                    envelope.msg.unwrap_or_default()
                ),
            });
        }

        let token: NorthboundToken =
            decode_nested_data(envelope.data).map_err(|message| Error::Authentication {
                message: format!("northbound login returned unusable data: {message}"),
            })?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = expiry_after(expires_in).ok_or_else(|| Error::Authentication {
            message: format!("northbound login returned unusable expiresIn: {expires_in}"),
        })?;
        self.store.install(
            SecretString::from(token.access_token),
            None,
            Some(expires_at),
            mechanism,
        );
        info!(?mechanism, expires_in, "northbound login successful");
        Ok(())
    }

    fn install_oauth(&self, token: OAuthToken, expires_at: DateTime<Utc>) {
        self.store.install(
            SecretString::from(token.access_token),
            Some(SecretString::from(token.refresh_token)),
            Some(expires_at),
            Mechanism::Password,
        );
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Absolute expiry for a server-reported lifetime. `None` for negative or
/// out-of-range values.
fn expiry_after(expires_in: i64) -> Option<DateTime<Utc>> {
    if expires_in < 0 {
        return None;
    }
    TimeDelta::try_seconds(expires_in).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
}

fn parse_oauth_token(body: &str) -> Option<OAuthToken> {
    serde_json::from_str::<OAuthEnvelope>(body).ok()?.data
}

/// Decode a `data` field that is either a JSON value or a JSON-encoded string.
pub(crate) fn decode_nested_data<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, String> {
    let value = match data {
        Value::String(inner) => serde_json::from_str(&inner).map_err(|e| e.to_string())?,
        other => other,
    };
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn nested_data_accepts_string_and_object() {
        let as_string = Value::String(r#"{"accessToken":"abc","expiresIn":100}"#.into());
        let token: NorthboundToken = decode_nested_data(as_string).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, Some(100));

        let as_object = json!({ "accessToken": "xyz" });
        let token: NorthboundToken = decode_nested_data(as_object).unwrap();
        assert_eq!(token.access_token, "xyz");
        assert_eq!(token.expires_in, None);
    }

    #[test]
    fn oauth_body_missing_fields_is_rejected() {
        assert!(parse_oauth_token(r#"{"data":{"access_token":"a","expires_in":10}}"#).is_none());
        assert!(parse_oauth_token(r#"{"data":null}"#).is_none());
        assert!(parse_oauth_token("not json").is_none());
        assert!(
            parse_oauth_token(
                r#"{"data":{"access_token":"a","refresh_token":"r","expires_in":10}}"#
            )
            .is_some()
        );
    }

    #[test]
    fn expiry_rejects_negative_and_overflowing_lifetimes() {
        assert!(expiry_after(-1).is_none());
        assert!(expiry_after(i64::MAX).is_none());
        let at = expiry_after(60).unwrap();
        assert!(at > Utc::now());
    }

    #[test]
    fn session_starts_unauthenticated() {
        let session = AuthSession::new(
            reqwest::Client::new(),
            Url::parse("https://api-eu.sigencloud.com/").unwrap(),
            Credentials::AppKey {
                app_key: "k".into(),
                app_secret: "s".to_string().into(),
            },
        );
        let state = session.token_state();
        assert!(state.access_token.is_none());
        assert_eq!(state.mechanism, Mechanism::Key);
    }
}
