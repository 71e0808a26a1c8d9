//! Cart synchronization.
//!
//! [`CartSynchronizer`] owns the local copy of the customer's server-held
//! cart. The copy is never edited in place: every successful mutation is
//! followed by a full re-fetch that replaces it. Session transitions are
//! observed on the session watch channel; a transition to anything other
//! than a customer session empties the copy, and a fetch started under an
//! earlier session is dropped when it completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use shopfront_core::{Capability, ProductId, Role, UserId};

use crate::api::{Api, Cart, Order, ShippingInfo};
use crate::error::{ClientError, require};
use crate::gateway::GatewayError;
use crate::session::{SessionSnapshot, SessionState};

/// Where the synchronizer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No one is logged in.
    Anonymous,
    /// Logged in with a role that has no cart.
    NonCustomer,
    /// A fetch is in flight.
    Loading,
    /// The last fetch finished, successfully or not.
    Ready,
}

/// The cached cart and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartState {
    pub phase: SyncPhase,
    /// Last successfully fetched cart. `None` when never fetched or when the
    /// backend has no cart for this customer.
    pub cart: Option<Cart>,
    /// Message of the most recent failure, cleared by the next good fetch.
    pub error: Option<String>,
}

impl CartState {
    fn idle(session: &SessionSnapshot) -> Self {
        let phase = if !session.is_authenticated() {
            SyncPhase::Anonymous
        } else if session.is_customer() {
            SyncPhase::Ready
        } else {
            SyncPhase::NonCustomer
        };
        Self {
            phase,
            cart: None,
            error: None,
        }
    }

    /// Units across all lines, zero without a cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.cart.as_ref().map_or(0, |cart| cart.total_items)
    }

    /// Cart total, zero without a cart.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.cart.as_ref().map_or(Decimal::ZERO, |cart| cart.total)
    }
}

/// Identity of a session for transition detection.
type SessionKey = (Option<UserId>, Option<Role>);

fn session_key(snapshot: &SessionSnapshot) -> SessionKey {
    (snapshot.user_id.clone(), snapshot.effective_role())
}

/// Keeps a local copy of the current customer's cart in step with the
/// backend.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<CartSynchronizerInner>,
}

struct CartSynchronizerInner {
    api: Api,
    tx: watch::Sender<CartState>,
    // Bumped on every session transition and on clear().
    generation: AtomicU64,
}

impl CartSynchronizer {
    /// Create a synchronizer for the session `api` authenticates with.
    ///
    /// Nothing is fetched until [`Self::watch_session`] or [`Self::refresh`].
    #[must_use]
    pub fn new(api: Api) -> Self {
        let (tx, _) = watch::channel(CartState::idle(&api.session().snapshot()));
        Self {
            inner: Arc::new(CartSynchronizerInner {
                api,
                tx,
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn session(&self) -> &SessionState {
        self.inner.api.session()
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn authorize(&self, capability: Capability) -> Result<(), ClientError> {
        require(&self.session().snapshot(), capability).map(drop)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The whole cache record.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.tx.borrow().clone()
    }

    /// Observe every change to the cache record.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.tx.subscribe()
    }

    /// Units in the cart. Always zero outside a customer session.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        if !self.session().snapshot().is_customer() {
            return 0;
        }
        self.inner.tx.borrow().item_count()
    }

    /// Cart total. Always zero outside a customer session.
    #[must_use]
    pub fn cart_total(&self) -> Decimal {
        if !self.session().snapshot().is_customer() {
            return Decimal::ZERO;
        }
        self.inner.tx.borrow().total()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product, then re-fetch the cart.
    ///
    /// # Errors
    ///
    /// `NotPermitted` outside a customer session, `Validation` for a zero
    /// quantity (neither sends a request), otherwise the error of the add or
    /// of the follow-up fetch.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<Cart>, ClientError> {
        self.authorize(Capability::ManageCart)?;
        if quantity == 0 {
            return Err(ClientError::validation("Quantity must be at least 1"));
        }

        let generation = self.generation();
        let result = self.inner.api.add_cart_item(product_id, quantity).await;
        self.after_mutation(generation, result).await
    }

    /// Set the quantity of a line. Zero or less removes the line instead;
    /// such an update is never sent.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_item`].
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<Option<Cart>, ClientError> {
        self.authorize(Capability::ManageCart)?;
        if quantity <= 0 {
            return self.remove_item(product_id).await;
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| ClientError::validation(format!("Quantity {quantity} is too large")))?;

        let generation = self.generation();
        let result = self.inner.api.update_cart_item(product_id, quantity).await;
        self.after_mutation(generation, result).await
    }

    /// Remove a product's line, then re-fetch the cart.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_item`].
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId) -> Result<Option<Cart>, ClientError> {
        self.authorize(Capability::ManageCart)?;

        let generation = self.generation();
        let result = self.inner.api.remove_cart_item(product_id).await;
        self.after_mutation(generation, result).await
    }

    /// Re-fetch the cart and replace the cache.
    ///
    /// Returns `None` when there is no cart, and also when the session changed
    /// or the cache was cleared while the fetch was in flight: such a cart is
    /// neither cached nor handed back.
    ///
    /// # Errors
    ///
    /// `NotPermitted` outside a customer session, otherwise the fetch error.
    /// The previous cache is kept on failure.
    pub async fn refresh(&self) -> Result<Option<Cart>, ClientError> {
        self.authorize(Capability::ManageCart)?;
        self.fetch(self.generation()).await
    }

    /// Empty the cache and the error without contacting the backend.
    /// Fetches already in flight are discarded when they complete.
    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let idle = CartState::idle(&self.session().snapshot());
        self.inner.tx.send_modify(|state| {
            state.cart = None;
            state.error = None;
            if state.phase == SyncPhase::Loading {
                state.phase = idle.phase;
            }
        });
        debug!("Cart cache cleared");
    }

    /// Place an order for the cart contents, then re-fetch the (now empty)
    /// cart.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without the `PlaceOrder` capability; `Validation` for
    /// blank shipping fields or an empty cart (neither sends a request);
    /// otherwise the order error. A failed follow-up fetch is recorded in
    /// the cache but does not fail the checkout.
    #[instrument(skip(self, shipping))]
    pub async fn checkout(
        &self,
        shipping: &ShippingInfo,
        pay_now: bool,
    ) -> Result<Order, ClientError> {
        self.authorize(Capability::PlaceOrder)?;

        let missing = shipping.missing_fields();
        if !missing.is_empty() {
            return Err(ClientError::validation(format!(
                "Missing shipping details: {}",
                missing.join(", ")
            )));
        }
        if self.inner.tx.borrow().cart.as_ref().is_none_or(Cart::is_empty) {
            return Err(ClientError::validation("Your cart is empty"));
        }

        let generation = self.generation();
        let order = match self.inner.api.place_order(shipping, pay_now).await {
            Ok(order) => order,
            Err(e) => {
                let err = ClientError::from(e);
                self.record_failure(generation, &err);
                return Err(err);
            }
        };
        info!(order = %order.id, total = %order.total, "Order placed");

        if let Err(e) = self.fetch(generation).await {
            warn!(error = %e, "Order placed but the cart could not be re-fetched");
        }
        Ok(order)
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// Spawn the task that applies session transitions to the cache.
    ///
    /// The current session is applied immediately. A snapshot for the same
    /// user and role is applied again when [`Self::clear`] ran since the last
    /// apply, so a logout followed by a login as the same customer still
    /// reloads the cart. The task ends when the synchronizer is dropped or
    /// the session's channel closes.
    #[must_use]
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut rx = self.session().subscribe();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let mut applied: Option<(SessionKey, u64)> = None;
            loop {
                let snapshot = rx.borrow_and_update().clone();
                let key = session_key(&snapshot);

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let sync = Self { inner };
                let current = (key, sync.generation());
                if applied.as_ref() != Some(&current) {
                    let generation = sync.apply_session(&snapshot);
                    applied = Some((current.0, generation));
                }
                drop(sync);

                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn apply_session(&self, snapshot: &SessionSnapshot) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !snapshot.is_customer() {
            debug!(authenticated = snapshot.is_authenticated(), "No cart for this session");
            self.inner.tx.send_replace(CartState::idle(snapshot));
            return generation;
        }

        debug!("Customer session, loading cart");
        self.inner.tx.send_replace(CartState {
            phase: SyncPhase::Loading,
            cart: None,
            error: None,
        });

        let sync = self.clone();
        tokio::spawn(async move {
            // Failures are already recorded in the cache.
            let _ = sync.fetch(generation).await;
        });
        generation
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn after_mutation<T>(
        &self,
        generation: u64,
        result: Result<T, GatewayError>,
    ) -> Result<Option<Cart>, ClientError> {
        if let Err(e) = result {
            let err = ClientError::from(e);
            warn!(error = %err, "Cart mutation failed");
            self.record_failure(generation, &err);
            return Err(err);
        }
        self.fetch(generation).await
    }

    async fn fetch(&self, generation: u64) -> Result<Option<Cart>, ClientError> {
        self.update(generation, |state| state.phase = SyncPhase::Loading);

        match self.inner.api.fetch_cart().await {
            Ok(cart) => {
                let applied = self.update(generation, |state| {
                    state.phase = SyncPhase::Ready;
                    state.cart.clone_from(&cart);
                    state.error = None;
                });
                if applied {
                    Ok(cart)
                } else {
                    debug!("Discarded cart fetched under a previous session");
                    Ok(None)
                }
            }
            Err(e) => {
                let err = ClientError::from(e);
                warn!(error = %err, "Cart fetch failed, keeping previous cart");
                self.update(generation, |state| {
                    state.phase = SyncPhase::Ready;
                    state.error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    fn record_failure(&self, generation: u64, err: &ClientError) {
        self.update(generation, |state| state.error = Some(err.to_string()));
    }

    /// Apply `f` to the cache unless the session changed since `generation`.
    fn update(&self, generation: u64, f: impl FnOnce(&mut CartState)) -> bool {
        self.inner.tx.send_if_modified(|state| {
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            f(state);
            true
        })
    }
}

impl std::fmt::Debug for CartSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.tx.borrow();
        f.debug_struct("CartSynchronizer")
            .field("phase", &state.phase)
            .field("item_count", &state.item_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{any, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use shopfront_core::Credentials;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ErrorKind;
    use crate::gateway::Gateway;
    use crate::session::MemoryStore;

    fn cart_body(total_items: u32, total: &str, items: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "c1",
            "items": items,
            "total_items": total_items,
            "total": total,
        })
    }

    fn one_mug(quantity: u32) -> serde_json::Value {
        let subtotal = format!("{}.00", quantity * 4);
        cart_body(
            quantity,
            &subtotal,
            serde_json::json!([{
                "id": "i1", "product": "p1", "product_name": "Mug",
                "product_price": "4.00", "quantity": quantity, "subtotal": subtotal
            }]),
        )
    }

    fn line(quantity: u32) -> ResponseTemplate {
        ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "i1", "product": "p1", "product_name": "Mug",
            "product_price": "4.00", "quantity": quantity, "subtotal": "4.00"
        }))
    }

    fn setup(server: &MockServer, role: Option<Role>) -> (SessionState, CartSynchronizer) {
        let config = ClientConfig::new(&format!("{}/api", server.uri())).unwrap();
        let session = SessionState::new(Arc::new(MemoryStore::new()));
        if let Some(role) = role {
            session
                .set_session(
                    &UserId::new("u1"),
                    "alice",
                    role,
                    &Credentials::new("alice", "pw"),
                )
                .unwrap();
        }
        let api = Api::new(Gateway::new(&config, session.clone()).unwrap());
        (session, CartSynchronizer::new(api))
    }

    async fn mount_cart(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_non_customer_operations_send_nothing() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        for role in [None, Some(Role::Admin), Some(Role::InventoryManager)] {
            let (_, sync) = setup(&server, role);
            let p = ProductId::new("p1");

            let errors = [
                sync.add_item(&p, 1).await.unwrap_err(),
                sync.update_quantity(&p, 2).await.unwrap_err(),
                sync.update_quantity(&p, 0).await.unwrap_err(),
                sync.remove_item(&p).await.unwrap_err(),
                sync.refresh().await.unwrap_err(),
            ];
            for err in errors {
                assert!(matches!(err, ClientError::NotPermitted { .. }), "{role:?}: {err}");
            }
            assert_eq!(sync.item_count(), 0);
            assert_eq!(sync.cart_total(), Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_add_item_refreshes_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/items/"))
            .and(body_json(serde_json::json!({"product_id": "p1", "quantity": 2})))
            .respond_with(line(2))
            .expect(1)
            .mount(&server)
            .await;
        mount_cart(&server, one_mug(2)).await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        let cart = sync.add_item(&ProductId::new("p1"), 2).await.unwrap().unwrap();

        assert_eq!(cart.total_items, 2);
        let state = sync.state();
        assert_eq!(state.phase, SyncPhase::Ready);
        assert_eq!(state.cart, Some(cart));
        assert_eq!(state.error, None);
        assert_eq!(sync.item_count(), 2);
        assert_eq!(sync.cart_total(), Decimal::from(8));
    }

    #[tokio::test]
    async fn test_add_zero_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        let err = sync.add_item(&ProductId::new("p1"), 0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_quantity_floor_removes_instead_of_updating() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(line(1))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/cart/items/p1/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;
        mount_cart(&server, cart_body(0, "0.00", serde_json::json!([]))).await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        let p = ProductId::new("p1");
        sync.update_quantity(&p, 0).await.unwrap();
        sync.update_quantity(&p, -3).await.unwrap();
        assert_eq!(sync.item_count(), 0);
    }

    #[tokio::test]
    async fn test_update_quantity_sends_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/cart/items/p1/"))
            .and(body_json(serde_json::json!({"product_id": "p1", "quantity": 5})))
            .respond_with(line(5))
            .expect(1)
            .mount(&server)
            .await;
        mount_cart(&server, one_mug(5)).await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.update_quantity(&ProductId::new("p1"), 5).await.unwrap();
        assert_eq!(sync.item_count(), 5);
    }

    #[tokio::test]
    async fn test_clear_empties_cache_and_error() {
        let server = MockServer::start().await;
        mount_cart(&server, one_mug(1)).await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.refresh().await.unwrap();
        assert_eq!(sync.item_count(), 1);

        sync.clear();
        let state = sync.state();
        assert_eq!(state.cart, None);
        assert_eq!(state.error, None);
        assert_eq!(sync.item_count(), 0);
        assert_eq!(sync.cart_total(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let server = MockServer::start().await;
        mount_cart(&server, one_mug(3)).await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.refresh().await.unwrap();
        let first = sync.state();
        sync.refresh().await.unwrap();
        assert_eq!(sync.state(), first);
    }

    #[tokio::test]
    async fn test_missing_cart_reads_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        assert_eq!(sync.refresh().await.unwrap(), None);
        assert_eq!(sync.state().phase, SyncPhase::Ready);
        assert_eq!(sync.item_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache_and_records_error() {
        let server = MockServer::start().await;
        mount_cart(&server, one_mug(1)).await;
        Mock::given(method("POST"))
            .and(path("/api/cart/items/"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Insufficient stock"})),
            )
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.refresh().await.unwrap();
        let before = sync.state().cart;

        let err = sync.add_item(&ProductId::new("p1"), 50).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let state = sync.state();
        assert_eq!(state.cart, before);
        assert_eq!(
            state.error.as_deref(),
            Some("API error: 400 - Insufficient stock")
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_after_mutation_keeps_previous_cart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_mug(1)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/cart/items/"))
            .respond_with(line(1))
            .expect(1)
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.refresh().await.unwrap();

        let err = sync.add_item(&ProductId::new("p2"), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let state = sync.state();
        assert_eq!(state.phase, SyncPhase::Ready);
        assert_eq!(state.cart.unwrap().total_items, 1);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_watch_session_loads_and_clears() {
        let server = MockServer::start().await;
        mount_cart(&server, one_mug(3)).await;

        let (session, sync) = setup(&server, None);
        assert_eq!(sync.state().phase, SyncPhase::Anonymous);
        let _task = sync.watch_session();
        let mut rx = sync.subscribe();

        session
            .set_session(
                &UserId::new("u1"),
                "alice",
                Role::Customer,
                &Credentials::new("alice", "pw"),
            )
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::Ready && s.cart.is_some()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(sync.item_count(), 3);

        session.clear_session().unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::Anonymous),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(sync.state().cart, None);
        assert_eq!(sync.item_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_session_non_customer_has_no_cart() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::ShipmentManager));
        let _task = sync.watch_session();
        let mut rx = sync.subscribe();

        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::NonCustomer),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(sync.state().cart, None);
    }

    #[tokio::test]
    async fn test_fetch_from_previous_session_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(one_mug(2))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let (session, sync) = setup(&server, Some(Role::Customer));
        let _task = sync.watch_session();
        let mut rx = sync.subscribe();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::Loading),
        )
        .await
        .unwrap()
        .unwrap();

        session.clear_session().unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::Anonymous),
        )
        .await
        .unwrap()
        .unwrap();

        // Let the delayed response land.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let state = sync.state();
        assert_eq!(state.phase, SyncPhase::Anonymous);
        assert_eq!(state.cart, None);
    }

    #[tokio::test]
    async fn test_relogin_as_same_customer_reloads_cart() {
        let server = MockServer::start().await;
        mount_cart(&server, one_mug(2)).await;

        let (session, sync) = setup(&server, Some(Role::Customer));
        let _task = sync.watch_session();
        let mut rx = sync.subscribe();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::Ready && s.cart.is_some()),
        )
        .await
        .unwrap()
        .unwrap();

        // Logout and login with no await in between: the watcher only ever
        // sees the final snapshot, identical to the one it last applied.
        session.clear_session().unwrap();
        sync.clear();
        session
            .set_session(
                &UserId::new("u1"),
                "alice",
                Role::Customer,
                &Credentials::new("alice", "pw"),
            )
            .unwrap();
        assert_eq!(sync.state().cart, None);

        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.phase == SyncPhase::Ready && s.cart.is_some()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(sync.item_count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_does_not_return_cart_of_ended_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(one_mug(5))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (session, sync) = setup(&server, Some(Role::Customer));
        let in_flight = tokio::spawn({
            let sync = sync.clone();
            async move { sync.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        session.clear_session().unwrap();
        sync.clear();

        let cart = in_flight.await.unwrap().unwrap();
        assert_eq!(cart, None);
        assert_eq!(sync.state().cart, None);
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_cart_locally() {
        let server = MockServer::start().await;
        mount_cart(&server, cart_body(0, "0.00", serde_json::json!([]))).await;
        Mock::given(method("POST"))
            .and(path("/api/orders/"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.refresh().await.unwrap();

        let shipping = ShippingInfo {
            full_name: "Alice".into(),
            address: "1 Rabbit Hole".into(),
            city: "Oxford".into(),
            postal_code: "OX1".into(),
        };
        let err = sync.checkout(&shipping, false).await.unwrap_err();
        assert_eq!(err.to_string(), "Your cart is empty");

        let err = sync
            .checkout(&ShippingInfo::default(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_checkout_places_order_and_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_mug(2)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_cart(&server, cart_body(0, "0.00", serde_json::json!([]))).await;
        Mock::given(method("POST"))
            .and(path("/api/orders/"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "o1", "created_at": "2024-05-01T09:30:00Z",
                "status": "pending", "total": "8.00"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_, sync) = setup(&server, Some(Role::Customer));
        sync.refresh().await.unwrap();
        assert_eq!(sync.item_count(), 2);

        let shipping = ShippingInfo {
            full_name: "Alice".into(),
            address: "1 Rabbit Hole".into(),
            city: "Oxford".into(),
            postal_code: "OX1".into(),
        };
        let order = sync.checkout(&shipping, false).await.unwrap();
        assert_eq!(order.id.as_str(), "o1");
        assert_eq!(sync.item_count(), 0);
    }
}
