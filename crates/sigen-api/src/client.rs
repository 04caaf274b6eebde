// Authenticated REST client
//
// Wraps `reqwest::Client` with the one contract every REST endpoint
// module relies on: validate the token right before sending, attach the
// bearer headers, and unwrap the `{ code, msg, data }` envelope. The
// endpoint modules (station, modes, smart loads, northbound) are
// implemented as inherent methods in their own files.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{AuthSession, Credentials};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest body preview kept in error messages.
const BODY_PREVIEW_LEN: usize = 200;

/// HTTP client for the Sigenergy cloud REST API.
///
/// Every call runs [`AuthSession::ensure_valid`] first, so a stale token
/// is caught synchronously even after long idle periods. All methods
/// return the unwrapped `data` payload.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    session: Arc<AuthSession>,
}

impl ApiClient {
    /// Build a client and its auth session from credentials.
    ///
    /// `base_url` must end with a slash (see [`crate::Region::api_base_url`]).
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let session = Arc::new(AuthSession::new(http.clone(), base_url, credentials));
        Ok(Self { http, session })
    }

    /// Wrap an existing `reqwest::Client` and session.
    pub fn with_session(http: reqwest::Client, session: Arc<AuthSession>) -> Self {
        Self { http, session }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    /// Run the full login for this client's credentials.
    pub async fn login(&self) -> Result<(), Error> {
        self.session.login().await
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"device/owner/station/home"`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url().join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated request and unwrap the envelope's `data`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.session.ensure_valid().await?;
        let headers = self.session.store().auth_headers()?;

        let url = self.url(path)?;
        debug!("{method} {url}");

        let mut builder = self.http.request(method, url).headers(headers);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        parse_envelope(resp).await
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.request::<T, ()>(Method::GET, path, &[], None).await
    }

    pub(crate) async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        self.request::<T, ()>(Method::GET, path, params, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized + Sync),
    ) -> Result<T, Error> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized + Sync),
    ) -> Result<T, Error> {
        self.request(Method::PUT, path, &[], Some(body)).await
    }

    pub(crate) async fn patch_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        self.request::<T, ()>(Method::PATCH, path, params, None).await
    }
}

// ── Envelope parsing ─────────────────────────────────────────────────

/// Map HTTP status and the `{ code, msg, data }` envelope onto `data` or
/// an [`Error::Api`].
///
/// Endpoints that omit `code` are treated as successful; a missing `data`
/// deserializes from JSON `null`.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;
    trace!(status = status.as_u16(), len = body.len(), "response received");

    if status.is_client_error() || status.is_server_error() {
        return Err(Error::Api {
            status: status.as_u16(),
            body: preview(&body).to_owned(),
            code: None,
        });
    }

    let envelope: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body: body.clone(),
    })?;

    if let Some(code) = envelope.get("code").and_then(Value::as_i64) {
        if code != 0 {
            return Err(Error::Api {
                status: status.as_u16(),
                body: preview(&body).to_owned(),
                code: Some(code),
            });
        }
    }

    let data = match envelope {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    };

    serde_json::from_value(data).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_respects_char_boundaries() {
        let long = "é".repeat(300);
        assert_eq!(preview(&long).chars().count(), BODY_PREVIEW_LEN);
        assert_eq!(preview("short"), "short");
    }
}
