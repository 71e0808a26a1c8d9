//! The storefront facade: one handle wiring the session, the cart and the
//! read-side services to a single gateway.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{info, instrument};

use shopfront_core::{Credentials, Email};

use crate::api::{Api, NewAccount, UserProfile};
use crate::cart::CartSynchronizer;
use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::dashboards::Dashboards;
use crate::error::{ClientError, DEFAULT_LOGIN_FAILURE};
use crate::gateway::{Gateway, GatewayError};
use crate::orders::Orders;
use crate::session::{FileStore, SessionSnapshot, SessionState};

/// Sign-up form contents.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
}

/// Client handle for one tab.
#[derive(Debug, Clone)]
pub struct Shop {
    api: Api,
    cart: CartSynchronizer,
    catalog: Catalog,
    orders: Orders,
    dashboards: Dashboards,
}

impl Shop {
    /// Build a shop for `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: SessionState) -> Result<Self, ClientError> {
        let api = Api::new(Gateway::new(config, session)?);
        Ok(Self {
            cart: CartSynchronizer::new(api.clone()),
            catalog: Catalog::new(api.clone(), config.catalog_cache_ttl),
            orders: Orders::new(api.clone()),
            dashboards: Dashboards::new(api.clone()),
            api,
        })
    }

    /// Build a shop whose session persists to `config.session_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let store = Arc::new(FileStore::new(config.session_file.clone()));
        Self::new(config, SessionState::new(store))
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        self.api.session()
    }

    #[must_use]
    pub const fn api(&self) -> &Api {
        &self.api
    }

    #[must_use]
    pub const fn cart(&self) -> &CartSynchronizer {
        &self.cart
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn orders(&self) -> &Orders {
        &self.orders
    }

    #[must_use]
    pub const fn dashboards(&self) -> &Dashboards {
        &self.dashboards
    }

    /// Authenticate and persist the session.
    ///
    /// A backend that omits the role logs the user in as a customer.
    ///
    /// # Errors
    ///
    /// `Validation` for blank input, `Authentication` when the backend
    /// rejects the credentials (the session is left as it was), otherwise
    /// the backend or store error.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionSnapshot, ClientError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::validation("Username and password are required"));
        }

        let credentials = Credentials::new(username, password);
        let user = self
            .api
            .login(&credentials)
            .await
            .map_err(login_error)?
            .user;
        let role = user.role.unwrap_or_default();

        self.session()
            .set_session(&user.id, &user.username, role, &credentials)?;
        info!(user = %user.id, role = %role, "Logged in");
        Ok(self.session().snapshot())
    }

    /// End the session and drop the cached cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written; the cart
    /// cache is cleared regardless.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<(), ClientError> {
        let cleared = self.session().clear_session();
        self.cart.clear();
        cleared?;
        info!("Logged out");
        Ok(())
    }

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email or blank fields, otherwise the
    /// backend error (a taken username arrives as a 400).
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: Registration) -> Result<UserProfile, ClientError> {
        let username = form.username.trim();
        if username.is_empty() {
            return Err(ClientError::validation("Username is required"));
        }
        let email = Email::parse(&form.email)
            .map_err(|e| ClientError::validation(format!("Invalid email: {e}")))?;

        let account = NewAccount {
            username: username.to_string(),
            email,
            password: form.password,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
        };
        let profile = self.api.register(&account).await?;
        info!(user = %profile.id, "Account created");
        Ok(profile)
    }

    /// Profile of the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn current_user(&self) -> Result<UserProfile, ClientError> {
        Ok(self.api.current_user().await?)
    }
}

fn login_error(err: GatewayError) -> ClientError {
    match err.status() {
        Some(400 | 401) => ClientError::Authentication(
            err.message().unwrap_or(DEFAULT_LOGIN_FAILURE).to_string(),
        ),
        _ => err.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use shopfront_core::{Role, UserId};

    use super::*;
    use crate::error::ErrorKind;
    use crate::session::{MemoryStore, SessionStore, keys};

    fn shop_for(server: &MockServer) -> (Arc<MemoryStore>, Shop) {
        let config = ClientConfig::new(&format!("{}/api", server.uri())).unwrap();
        let store = Arc::new(MemoryStore::new());
        let shop = Shop::new(&config, SessionState::new(store.clone())).unwrap();
        (store, shop)
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": {"id": 42, "username": "alice", "role": "customer"}
            })))
            .mount(&server)
            .await;

        let (store, shop) = shop_for(&server);
        let snapshot = shop.login(" alice ", "pw").await.unwrap();

        assert_eq!(snapshot.user_id, Some(UserId::new("42")));
        assert!(snapshot.is_customer());
        assert_eq!(store.get(keys::CREDENTIALS_USERNAME).as_deref(), Some("alice"));
        assert_eq!(store.get(keys::CREDENTIALS_SECRET).as_deref(), Some("pw"));
    }

    #[tokio::test]
    async fn test_login_without_role_defaults_to_customer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": {"id": "u1", "username": "bob"}
            })))
            .mount(&server)
            .await;

        let (store, shop) = shop_for(&server);
        shop.login("bob", "pw").await.unwrap();
        assert_eq!(store.get(keys::ROLE).as_deref(), Some("customer"));
        assert_eq!(shop.session().current_role(), Some(Role::Customer));
    }

    #[tokio::test]
    async fn test_rejected_login_leaves_session_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (store, shop) = shop_for(&server);
        let err = shop.login("alice", "wrong").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.to_string(), DEFAULT_LOGIN_FAILURE);
        assert_eq!(store.get(keys::USER_ID), None);
    }

    #[tokio::test]
    async fn test_login_error_uses_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Account disabled"})),
            )
            .mount(&server)
            .await;

        let (_, shop) = shop_for(&server);
        let err = shop.login("alice", "pw").await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(ref m) if m == "Account disabled"));
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_cart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": {"id": 1, "username": "alice", "role": "customer"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1, "total_items": 2, "total": "8.00", "items": []
            })))
            .mount(&server)
            .await;

        let (store, shop) = shop_for(&server);
        shop.login("alice", "pw").await.unwrap();
        shop.cart().refresh().await.unwrap();
        assert_eq!(shop.cart().item_count(), 2);

        shop.logout().unwrap();
        for key in keys::ALL {
            assert_eq!(store.get(key), None);
        }
        assert_eq!(shop.cart().state().cart, None);
        assert_eq!(shop.cart().item_count(), 0);
    }

    #[tokio::test]
    async fn test_register_validates_email_locally() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (_, shop) = shop_for(&server);
        let err = shop
            .register(Registration {
                username: "alice".into(),
                email: "not-an-email".into(),
                password: SecretString::from("pw".to_string()),
                first_name: "Alice".into(),
                last_name: "Liddell".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
