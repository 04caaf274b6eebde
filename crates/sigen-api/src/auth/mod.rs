// Authentication: credential kinds, the token store, and the session
// that drives the login/refresh protocols.

mod session;
mod token;

pub use session::AuthSession;
pub use token::{TokenState, TokenStore};

use secrecy::SecretString;

/// Which token-issuing protocol produced (or will produce) a token.
///
/// Marker enum (no data) -- the actual secrets live in [`Credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// OAuth password grant (`auth/oauth/token`). Supports refresh tokens.
    Password,
    /// Northbound app-key login (`openapi/auth/login/key`). Re-login on expiry.
    Key,
    /// Northbound account login (`openapi/auth/login/password`). Re-login on expiry.
    Account,
}

impl Mechanism {
    /// Whether an expired token is renewed through a separate refresh exchange
    /// rather than by running the full login again.
    pub fn supports_refresh(self) -> bool {
        matches!(self, Self::Password)
    }
}

/// Credentials for one of the token-issuing protocols.
///
/// Immutable after construction; determines which login protocol the
/// [`AuthSession`] runs.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Account username + plaintext password for the OAuth password grant.
    /// The password is encoded with [`crate::credential::encode_password`]
    /// when the session is built.
    Password {
        username: String,
        password: SecretString,
    },

    /// Developer app key + secret for the northbound key login.
    AppKey {
        app_key: String,
        app_secret: SecretString,
    },

    /// Account username + plaintext password for the northbound password login.
    Account {
        username: String,
        password: SecretString,
    },
}

impl Credentials {
    pub fn mechanism(&self) -> Mechanism {
        match self {
            Self::Password { .. } => Mechanism::Password,
            Self::AppKey { .. } => Mechanism::Key,
            Self::Account { .. } => Mechanism::Account,
        }
    }

    /// The app key, for key credentials (used as the MQTT username).
    pub fn app_key(&self) -> Option<&str> {
        match self {
            Self::AppKey { app_key, .. } => Some(app_key),
            _ => None,
        }
    }
}
