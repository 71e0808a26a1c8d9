//! Cart cache behaviour through the public `Shop` API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use shopfront_client::session::MemoryStore;
use shopfront_client::{ClientError, ErrorKind, SyncPhase};
use shopfront_core::ProductId;
use shopfront_integration_tests::{TestBackend, cart_json};

// =============================================================================
// Customer flows
// =============================================================================

#[tokio::test]
async fn test_add_item_cache_matches_server_cart() {
    let backend = TestBackend::start().await;
    backend.mount_login("u1", "alice", Some("customer")).await;
    Mock::given(method("POST"))
        .and(path("/api/cart/items/"))
        .and(body_json(serde_json::json!({"product_id": "p1", "quantity": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 1, "product": "p1", "product_name": "Lamp",
            "product_price": "10.00", "quantity": 2, "subtotal": "20.00"
        })))
        .expect(1)
        .mount(&backend.server)
        .await;
    let server_cart = cart_json(&[("p1", "Lamp", 2, 10)]);
    backend.mount_cart(server_cart.clone()).await;

    let shop = backend.shop(Arc::new(MemoryStore::new()));
    shop.login("alice", "pw").await.unwrap();
    shop.cart().add_item(&ProductId::new("p1"), 2).await.unwrap();

    // The cache is exactly what the backend reports, nothing computed locally.
    let expected = serde_json::from_value(server_cart).unwrap();
    assert_eq!(shop.cart().state().cart, Some(expected));
    assert_eq!(shop.cart().item_count(), 2);
    assert_eq!(shop.cart().cart_total(), Decimal::from(20));
}

#[tokio::test]
async fn test_admin_cannot_touch_cart() {
    let backend = TestBackend::start().await;
    backend.mount_login("u2", "root", Some("admin")).await;

    let shop = backend.shop(Arc::new(MemoryStore::new()));
    shop.login("root", "pw").await.unwrap();

    // Only the login may reach the backend from here on.
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&backend.server)
        .await;

    let err = shop
        .cart()
        .add_item(&ProductId::new("p1"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotPermitted { .. }));
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(shop.cart().item_count(), 0);
}

#[tokio::test]
async fn test_update_to_zero_removes_line() {
    let backend = TestBackend::start().await;
    backend.mount_login("u1", "alice", Some("customer")).await;
    backend
        .mount_cart_times(cart_json(&[("p1", "Lamp", 3, 10), ("p2", "Rug", 1, 40)]), 1)
        .await;
    backend.mount_cart(cart_json(&[("p2", "Rug", 1, 40)])).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart/items/p1/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&backend.server)
        .await;

    let shop = backend.shop(Arc::new(MemoryStore::new()));
    shop.login("alice", "pw").await.unwrap();
    shop.cart().refresh().await.unwrap();
    assert_eq!(shop.cart().item_count(), 4);

    let cart = shop
        .cart()
        .update_quantity(&ProductId::new("p1"), 0)
        .await
        .unwrap()
        .unwrap();
    assert!(cart.line(&ProductId::new("p1")).is_none());
    assert_eq!(shop.cart().item_count(), 1);
    assert_eq!(shop.cart().cart_total(), Decimal::from(40));
}

#[tokio::test]
async fn test_logout_empties_cart_immediately() {
    let backend = TestBackend::start().await;
    backend.mount_login("u1", "alice", Some("customer")).await;
    backend.mount_cart(cart_json(&[("p1", "Lamp", 2, 10)])).await;

    let shop = backend.shop(Arc::new(MemoryStore::new()));
    shop.login("alice", "pw").await.unwrap();
    shop.cart().refresh().await.unwrap();
    assert_eq!(shop.cart().item_count(), 2);

    shop.logout().unwrap();

    // No await between logout and these reads.
    assert_eq!(shop.cart().item_count(), 0);
    assert_eq!(shop.cart().cart_total(), Decimal::ZERO);
    assert!(shop.cart().state().cart.is_none());
}

#[tokio::test]
async fn test_watcher_follows_login_and_logout() {
    let backend = TestBackend::start().await;
    backend.mount_login("u1", "alice", Some("customer")).await;
    backend.mount_cart(cart_json(&[("p1", "Lamp", 1, 10)])).await;

    let shop = backend.shop(Arc::new(MemoryStore::new()));
    let _watcher = shop.cart().watch_session();
    let mut rx = shop.cart().subscribe();

    shop.login("alice", "pw").await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|s| s.phase == SyncPhase::Ready && s.cart.is_some()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(shop.cart().item_count(), 1);

    shop.logout().unwrap();
    tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|s| s.phase == SyncPhase::Anonymous),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(shop.cart().state().cart.is_none());
}

#[tokio::test]
async fn test_server_validation_error_is_surfaced() {
    let backend = TestBackend::start().await;
    backend.mount_login("u1", "alice", Some("customer")).await;
    backend.mount_cart(cart_json(&[("p1", "Lamp", 1, 10)])).await;
    Mock::given(method("POST"))
        .and(path("/api/cart/items/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"quantity": ["Only 2 left in stock"]})),
        )
        .mount(&backend.server)
        .await;

    let shop = backend.shop(Arc::new(MemoryStore::new()));
    shop.login("alice", "pw").await.unwrap();
    shop.cart().refresh().await.unwrap();

    let err = shop
        .cart()
        .add_item(&ProductId::new("p1"), 5)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("Only 2 left in stock"));

    let state = shop.cart().state();
    assert_eq!(state.cart.unwrap().total_items, 1);
    assert!(state.error.unwrap().contains("Only 2 left in stock"));
}
