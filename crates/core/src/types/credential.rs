//! Login credentials attached to backend requests.

use secrecy::{ExposeSecret, SecretString};

/// A username/secret pair used for HTTP basic authentication.
///
/// Implements `Debug` manually so the secret never reaches logs.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: SecretString,
}

impl Credentials {
    /// Create credentials from a username and a secret.
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// The username half of the pair.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret half of the pair.
    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// The `username:secret` string that basic authentication encodes.
    #[must_use]
    pub fn basic_pair(&self) -> String {
        format!("{}:{}", self.username, self.secret.expose_secret())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
