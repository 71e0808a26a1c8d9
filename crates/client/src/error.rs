//! Client error type and its classification.

use thiserror::Error;

use shopfront_core::{Capability, Role};

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::session::{SessionSnapshot, StoreError};

/// Message shown when the backend rejects a login without saying why.
pub const DEFAULT_LOGIN_FAILURE: &str = "Invalid username or password";

/// Errors returned by client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The current session's role does not grant the capability. Raised
    /// before any request is sent.
    #[error("{} may not {capability}", role_label(*role))]
    NotPermitted {
        capability: Capability,
        role: Option<Role>,
    },

    /// Input rejected locally.
    #[error("{0}")]
    Validation(String),

    /// Login rejected.
    #[error("{0}")]
    Authentication(String),

    /// The session store could not be written.
    #[error(transparent)]
    Session(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn role_label(role: Option<Role>) -> &'static str {
    role.map_or("anonymous user", Role::label)
}

/// Broad category of a [`ClientError`], for deciding what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Login failed.
    Authentication,
    /// Not allowed for this session, locally or by the backend.
    Authorization,
    /// The request was understood and refused as invalid.
    Validation,
    /// Network, timeout, server or decoding failure.
    Transport,
}

impl ClientError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::NotPermitted { .. } => ErrorKind::Authorization,
            Self::Validation(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Session(_) => ErrorKind::Transport,
            Self::Gateway(e) => match e.status() {
                Some(401 | 403) => ErrorKind::Authorization,
                Some(400..=499) => ErrorKind::Validation,
                _ => ErrorKind::Transport,
            },
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Fail with [`ClientError::NotPermitted`] unless `session` grants
/// `capability`.
///
/// # Errors
///
/// Returns `NotPermitted` for anonymous sessions and roles lacking the
/// capability.
pub fn require(session: &SessionSnapshot, capability: Capability) -> Result<Role, ClientError> {
    let role = session.effective_role();
    match role {
        Some(role) if role.can(capability) => Ok(role),
        _ => Err(ClientError::NotPermitted { capability, role }),
    }
}
