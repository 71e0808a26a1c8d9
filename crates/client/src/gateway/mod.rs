//! Backend gateway: the single place outgoing requests are built.
//!
//! Every request except login and signup carries the session credentials as
//! an HTTP basic `Authorization` header. Non-2xx responses become
//! [`GatewayError::Status`] with the server's message; transport failures
//! become [`GatewayError::Transport`]. Nothing is retried.

mod error;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use shopfront_core::Credentials;

use crate::config::{ClientConfig, UnauthorizedPolicy};
use crate::session::SessionState;

pub use error::GatewayError;
pub(crate) use error::extract_message;

/// Path segments that establish credentials rather than presuppose them.
const CREDENTIAL_EXEMPT_SEGMENTS: &[&str] = &["login", "signup", "register"];

/// Whether a request to `path` must go out without credentials.
#[must_use]
pub fn is_credential_exempt(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/')
        .any(|segment| CREDENTIAL_EXEMPT_SEGMENTS.contains(&segment))
}

/// Build the `Authorization` header value for `credentials`.
#[must_use]
pub fn basic_auth_header(credentials: &Credentials) -> String {
    format!("Basic {}", STANDARD.encode(credentials.basic_pair()))
}

/// HTTP gateway to the storefront REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    base_url: Url,
    session: SessionState,
    on_unauthorized: UnauthorizedPolicy,
}

impl Gateway {
    /// Create a gateway reading credentials from `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, session: SessionState) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("shopfront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(GatewayInner {
                client,
                base_url: config.api_url.clone(),
                session,
                on_unauthorized: config.on_unauthorized,
            }),
        })
    }

    /// The session whose credentials this gateway attaches.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    /// The policy applied to 401 responses.
    #[must_use]
    pub fn unauthorized_policy(&self) -> UnauthorizedPolicy {
        self.inner.on_unauthorized
    }

    // =========================================================================
    // Typed helpers
    // =========================================================================

    /// `GET` and decode the body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a body that
    /// does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let body = self.dispatch(Method::GET, path, self.request(Method::GET, path)?).await?;
        decode(path, &body)
    }

    /// `GET` with query parameters and decode the body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let builder = self.request(Method::GET, path)?.query(query);
        let body = self.dispatch(Method::GET, path, builder).await?;
        decode(path, &body)
    }

    /// `GET` a resource that may not exist: 404, an empty body and JSON
    /// `null` all read as `None`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`], except for 404.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, GatewayError> {
        match self.dispatch(Method::GET, path, self.request(Method::GET, path)?).await {
            Ok(body) if body.trim().is_empty() || body.trim() == "null" => Ok(None),
            Ok(body) => decode(path, &body).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `POST` a JSON body and decode the response.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    /// `POST` without a body and decode the response.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let body = self
            .dispatch(Method::POST, path, self.request(Method::POST, path)?)
            .await?;
        decode(path, &body)
    }

    /// `PUT` a JSON body and decode the response.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    /// `PATCH` a JSON body and decode the response.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, body).await
    }

    /// `DELETE`, discarding any response body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or non-2xx status.
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.dispatch(Method::DELETE, path, self.request(Method::DELETE, path)?)
            .await
            .map(drop)
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method.clone(), path)?.json(body);
        let body = self.dispatch(method, path, builder).await?;
        decode(path, &body)
    }

    // =========================================================================
    // Request construction and dispatch
    // =========================================================================

    /// Resolve `path` against the base URL and attach credentials unless the
    /// path is a login or signup endpoint.
    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        let url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::Endpoint {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let builder = self.inner.client.request(method, url);

        if is_credential_exempt(path) {
            return Ok(builder);
        }

        match self.inner.session.credentials() {
            Some(credentials) => {
                let value = HeaderValue::from_str(&basic_auth_header(&credentials)).map_err(|e| {
                    GatewayError::Endpoint {
                        path: path.to_string(),
                        reason: format!("credentials not encodable as a header: {e}"),
                    }
                })?;
                Ok(builder.header(AUTHORIZATION, value))
            }
            None => Ok(builder),
        }
    }

    /// Send the request and return the body of a 2xx response.
    #[instrument(skip(self, builder), fields(method = %method, path = %path))]
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<String, GatewayError> {
        let response = builder.send().await.inspect_err(|e| {
            warn!(error = %e, "Request failed before a response arrived");
        })?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            debug!(status = status.as_u16(), "Request succeeded");
            return Ok(body);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(path);
        }

        let message = extract_message(&body);
        debug!(
            status = status.as_u16(),
            message = message.as_deref().unwrap_or(""),
            "Backend returned non-success status"
        );

        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn handle_unauthorized(&self, path: &str) {
        if is_credential_exempt(path) {
            // A failed login is an authentication failure, not a stale session.
            return;
        }

        warn!(policy = ?self.inner.on_unauthorized, "Unauthorized");

        if self.inner.on_unauthorized == UnauthorizedPolicy::Clear
            && let Err(e) = self.inner.session.clear_session()
        {
            tracing::error!(error = %e, "Failed to clear session after 401");
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("on_unauthorized", &self.inner.on_unauthorized)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, GatewayError> {
    // Empty 2xx bodies decode as JSON null so `()` and `Option<_>` work.
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            path,
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        GatewayError::Decode(e.to_string())
    })
}
