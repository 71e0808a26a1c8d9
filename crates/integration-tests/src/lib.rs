//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! Every test runs against a `wiremock` backend; no real storefront is
//! needed.
//!
//! # Test Categories
//!
//! - `cart_sync` - cart cache behaviour through the public `Shop` API
//! - `session_transitions` - login, logout, tabs and persisted sessions

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopfront_client::session::{SessionBus, SessionState, SessionStore};
use shopfront_client::{ClientConfig, Shop, UnauthorizedPolicy};

/// A mock storefront backend.
pub struct TestBackend {
    pub server: MockServer,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Client configuration pointing at this backend.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&format!("{}/api", self.server.uri())).unwrap()
    }

    /// A shop whose session lives in `store`.
    #[must_use]
    pub fn shop(&self, store: Arc<dyn SessionStore>) -> Shop {
        Shop::new(&self.config(), SessionState::new(store)).unwrap()
    }

    /// A shop with the given 401 policy.
    #[must_use]
    pub fn shop_with_policy(&self, store: Arc<dyn SessionStore>, policy: UnauthorizedPolicy) -> Shop {
        let mut config = self.config();
        config.on_unauthorized = policy;
        Shop::new(&config, SessionState::new(store)).unwrap()
    }

    /// A shop acting as one browser tab: shared store, shared bus, listening
    /// for the other tabs.
    #[must_use]
    pub fn tab(&self, store: Arc<dyn SessionStore>, bus: &SessionBus) -> Shop {
        let session = SessionState::with_bus(store, bus.clone());
        // Detached; ends when the session is dropped.
        let _ = session.spawn_cross_tab_listener();
        Shop::new(&self.config(), session).unwrap()
    }

    /// Accept any login and answer with this user.
    pub async fn mount_login(&self, user_id: &str, username: &str, role: Option<&str>) {
        let mut user = serde_json::json!({"id": user_id, "username": username});
        if let Some(role) = role {
            user["role"] = role.into();
        }
        Mock::given(method("POST"))
            .and(path("/api/auth/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"user": user})))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` from `GET cart/` until replaced or exhausted.
    pub async fn mount_cart(&self, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` from `GET cart/` for the next `times` fetches only.
    pub async fn mount_cart_times(&self, body: serde_json::Value, times: u64) {
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }
}

/// A cart line: product id, name, quantity, unit price in whole dollars.
pub type Line<'a> = (&'a str, &'a str, u32, u32);

/// Build a cart response as the backend computes it.
#[must_use]
pub fn cart_json(lines: &[Line<'_>]) -> serde_json::Value {
    let items: Vec<serde_json::Value> = lines
        .iter()
        .enumerate()
        .map(|(i, (product, name, quantity, price))| {
            serde_json::json!({
                "id": i + 1,
                "product": product,
                "product_name": name,
                "product_price": format!("{price}.00"),
                "quantity": quantity,
                "subtotal": format!("{}.00", quantity * price),
            })
        })
        .collect();

    let total_items: u32 = lines.iter().map(|(_, _, quantity, _)| quantity).sum();
    let total: u32 = lines.iter().map(|(_, _, quantity, price)| quantity * price).sum();

    serde_json::json!({
        "id": "cart-1",
        "items": items,
        "total_items": total_items,
        "total": format!("{total}.00"),
    })
}
