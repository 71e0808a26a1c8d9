//! Typed bindings for every backend operation.
//!
//! One method per endpoint, no policy: role gating, caching and cart
//! bookkeeping live in the layers above. Paths are relative to the
//! configured API base URL.

mod types;

use secrecy::ExposeSecret;
use tracing::instrument;

use shopfront_core::{Credentials, InvoiceId, OrderId, ProductId};

use crate::gateway::{Gateway, GatewayError};
use crate::session::SessionState;

pub(crate) use types::{CartItemRequest, LoginRequest, PlaceOrderRequest, StockUpdate};
pub use types::{
    Cart, CartLineItem, Category, Invoice, InvoiceRef, LoginResponse, NewAccount, Order, OrderItem,
    PeriodSales, Product, ProductDraft, Receipt, SalesAnalytics, SalesSummary, SessionUser, Shipment,
    ShipmentDashboard, ShippingInfo, TopProduct, UserProfile,
};

/// Inclusive date range for sales analytics, as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DateRange {
    #[serde(rename = "start_date", skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(rename = "end_date", skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Storefront REST API.
#[derive(Debug, Clone)]
pub struct Api {
    gateway: Gateway,
}

impl Api {
    #[must_use]
    pub const fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The session whose credentials requests carry.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        self.gateway.session()
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Authenticate. Sent without credentials.
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, GatewayError> {
        let body = LoginRequest {
            username: credentials.username(),
            password: credentials.secret().expose_secret(),
        };
        self.gateway.post("auth/login/", &body).await
    }

    /// Create an account. Sent without credentials.
    #[instrument(skip(self, account), fields(username = %account.username))]
    pub async fn register(&self, account: &NewAccount) -> Result<UserProfile, GatewayError> {
        self.gateway.post("auth/signup/", account).await
    }

    /// Profile of the logged-in user, including the wallet balance.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<UserProfile, GatewayError> {
        self.gateway.get("users/me/").await
    }

    // =========================================================================
    // Cart (never cached here)
    // =========================================================================

    /// The current customer's cart; `None` when the backend has none yet.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<Option<Cart>, GatewayError> {
        self.gateway.get_optional("cart/").await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn add_cart_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartLineItem, GatewayError> {
        let body = CartItemRequest {
            product_id,
            quantity,
        };
        self.gateway.post("cart/items/", &body).await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn update_cart_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartLineItem, GatewayError> {
        let body = CartItemRequest {
            product_id,
            quantity,
        };
        self.gateway
            .put(&format!("cart/items/{product_id}/"), &body)
            .await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn remove_cart_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        self.gateway
            .delete(&format!("cart/items/{product_id}/"))
            .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Check out the cart. The backend empties the cart on success.
    #[instrument(skip(self, shipping))]
    pub async fn place_order(
        &self,
        shipping: &ShippingInfo,
        pay_now: bool,
    ) -> Result<Order, GatewayError> {
        self.gateway
            .post("orders/", &PlaceOrderRequest::new(shipping, pay_now))
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, GatewayError> {
        self.gateway.get("orders/").await
    }

    #[instrument(skip(self), fields(order = %order_id))]
    pub async fn order_invoice(&self, order_id: &OrderId) -> Result<Option<Invoice>, GatewayError> {
        self.gateway
            .get_optional(&format!("orders/{order_id}/invoice/"))
            .await
    }

    /// Pay an invoice from the wallet.
    #[instrument(skip(self), fields(invoice = %invoice_id))]
    pub async fn pay_invoice(&self, invoice_id: &InvoiceId) -> Result<Receipt, GatewayError> {
        self.gateway
            .post_empty(&format!("invoices/{invoice_id}/pay/"))
            .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, GatewayError> {
        self.gateway.get("products/").await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, GatewayError> {
        self.gateway.get(&format!("products/{product_id}/")).await
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, GatewayError> {
        self.gateway.get("categories/").await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn update_stock(
        &self,
        product_id: &ProductId,
        stock: u32,
    ) -> Result<Product, GatewayError> {
        self.gateway
            .patch(&format!("products/{product_id}/stock/"), &StockUpdate { stock })
            .await
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, GatewayError> {
        self.gateway.post("products/", draft).await
    }

    #[instrument(skip(self, draft), fields(product = %product_id))]
    pub async fn update_product(
        &self,
        product_id: &ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, GatewayError> {
        self.gateway
            .put(&format!("products/{product_id}/"), draft)
            .await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        self.gateway.delete(&format!("products/{product_id}/")).await
    }

    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn set_product_active(
        &self,
        product_id: &ProductId,
        active: bool,
    ) -> Result<Product, GatewayError> {
        let action = if active { "enable" } else { "disable" };
        self.gateway
            .post_empty(&format!("products/{product_id}/{action}/"))
            .await
    }

    // =========================================================================
    // Dashboards
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn shipment_dashboard(&self) -> Result<ShipmentDashboard, GatewayError> {
        self.gateway.get("shipments/dashboard/").await
    }

    #[instrument(skip(self))]
    pub async fn sales_analytics(&self, range: &DateRange) -> Result<SalesAnalytics, GatewayError> {
        self.gateway
            .get_with_query("analytics/sales/", range)
            .await
    }
}
