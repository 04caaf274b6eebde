// Token store
//
// Holds the bearer token, its expiry, and the mechanism that issued it.
// The whole state is swapped atomically so readers never see a token
// paired with another token's expiry.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use super::Mechanism;
use crate::error::Error;

/// Snapshot of the session's token material.
#[derive(Debug, Clone)]
pub struct TokenState {
    pub access_token: Option<SecretString>,
    /// Only issued by the OAuth password grant.
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
    pub mechanism: Mechanism,
}

impl TokenState {
    pub fn empty(mechanism: Mechanism) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: None,
            mechanism,
        }
    }

    /// A token is usable while present and strictly before its expiry.
    /// `now == expires_at` already counts as stale.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_some() && self.expires_at.is_none_or(|exp| now < exp)
    }
}

/// Single-writer, many-reader holder for the current [`TokenState`].
#[derive(Debug)]
pub struct TokenStore {
    state: ArcSwap<TokenState>,
}

impl TokenStore {
    pub fn new(mechanism: Mechanism) -> Self {
        Self {
            state: ArcSwap::from_pointee(TokenState::empty(mechanism)),
        }
    }

    pub fn current(&self) -> Arc<TokenState> {
        self.state.load_full()
    }

    /// Replace the full token/expiry pair in one step.
    pub fn install(
        &self,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
        expires_at: Option<DateTime<Utc>>,
        mechanism: Mechanism,
    ) {
        self.state.store(Arc::new(TokenState {
            access_token: Some(access_token),
            refresh_token,
            expires_at,
            mechanism,
        }));
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.state.load().is_valid_at(now)
    }

    /// `Authorization: Bearer <token>` plus the JSON content type.
    pub fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let state = self.state.load();
        let token = state
            .access_token
            .as_ref()
            .ok_or_else(|| Error::Authentication {
                message: "no access token -- login required".into(),
            })?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("access token is not a valid header value: {e}"),
            })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}
