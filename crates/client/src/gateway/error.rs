//! Gateway error types.

use thiserror::Error;

/// Maximum characters of a raw response body kept as an error message.
const MAX_MESSAGE_CHARS: usize = 200;

/// Errors surfaced by the backend gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or client construction failure.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("API error: {status}{}", format_message(message.as_deref()))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message supplied by the server, if any.
        message: Option<String>,
    },

    /// A 2xx response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Decode(String),

    /// The endpoint path could not be resolved against the base URL.
    #[error("Invalid endpoint {path}: {reason}")]
    Endpoint {
        /// Relative path that was requested.
        path: String,
        /// Why it could not be joined.
        reason: String,
    },
}

fn format_message(message: Option<&str>) -> String {
    message.map_or_else(String::new, |m| format!(" - {m}"))
}

impl GatewayError {
    /// HTTP status of a `Status` error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-supplied message of a `Status` error.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the backend rejected the credentials (401).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401))
    }

    /// Whether the backend refused the operation for this user (403).
    #[must_use]
    pub const fn is_forbidden(&self) -> bool {
        matches!(self.status(), Some(403))
    }

    /// Whether the resource does not exist (404).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

/// Pull a human-readable message out of an error response body.
///
/// Understands `{"error": ..}`, `{"detail": ..}`, `{"message": ..}` and
/// field-keyed validation maps (`{"quantity": ["Only 2 left"]}`). Anything
/// else falls back to the first characters of the raw body.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "detail", "message"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                return Some(message.clone());
            }
        }

        let fields: Vec<String> = map
            .iter()
            .filter_map(|(field, value)| {
                let messages: Vec<&str> = match value {
                    serde_json::Value::String(s) => vec![s.as_str()],
                    serde_json::Value::Array(items) => {
                        items.iter().filter_map(serde_json::Value::as_str).collect()
                    }
                    _ => Vec::new(),
                };
                if messages.is_empty() {
                    return None;
                }
                let joined = messages.join(" ");
                if field == "non_field_errors" {
                    Some(joined)
                } else {
                    Some(format!("{field}: {joined}"))
                }
            })
            .collect();

        if !fields.is_empty() {
            return Some(fields.join("; "));
        }
    }

    Some(body.chars().take(MAX_MESSAGE_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = GatewayError::Status {
            status: 400,
            message: Some("Insufficient stock".to_string()),
        };
        assert_eq!(err.to_string(), "API error: 400 - Insufficient stock");

        let err = GatewayError::Status {
            status: 502,
            message: None,
        };
        assert_eq!(err.to_string(), "API error: 502");
    }

    #[test]
    fn test_status_helpers() {
        let err = GatewayError::Status {
            status: 401,
            message: None,
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_not_found());
        assert_eq!(err.status(), Some(401));
        assert_eq!(GatewayError::Decode("x".into()).status(), None);
    }

    #[test]
    fn test_extract_error_key() {
        assert_eq!(
            extract_message(r#"{"error": "Invalid username or password"}"#).as_deref(),
            Some("Invalid username or password")
        );
        assert_eq!(
            extract_message(r#"{"detail": "Not found."}"#).as_deref(),
            Some("Not found.")
        );
    }

    #[test]
    fn test_extract_field_errors() {
        let message = extract_message(r#"{"quantity": ["Only 2 left in stock"]}"#);
        assert_eq!(message.as_deref(), Some("quantity: Only 2 left in stock"));

        let message = extract_message(r#"{"non_field_errors": ["Cart is empty"]}"#);
        assert_eq!(message.as_deref(), Some("Cart is empty"));
    }

    #[test]
    fn test_extract_plain_text_is_truncated() {
        let body = "x".repeat(500);
        assert_eq!(extract_message(&body).map(|m| m.len()), Some(200));
        assert_eq!(extract_message("   "), None);
    }
}
