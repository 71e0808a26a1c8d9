//! Wire types for the storefront REST API.
//!
//! Field names follow the backend's JSON. Money fields accept either JSON
//! strings or numbers; optional fields default so older backends still decode.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use shopfront_core::{
    CartId, CartItemId, CategoryId, Email, InvoiceId, InvoiceStatus, OrderId, OrderStatus,
    ProductId, ReceiptId, Role, ShipmentId, ShipmentStatus, UserId, format_money,
};

const fn default_true() -> bool {
    true
}

// =============================================================================
// Auth
// =============================================================================

/// Body of `POST auth/login/`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// The user record returned by login.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub username: String,
    /// Absent on older backends; treated as customer at login.
    #[serde(default)]
    pub role: Option<Role>,
}

/// Response of `POST auth/login/`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: SessionUser,
}

/// Profile submitted to `POST auth/signup/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: Email,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// A full user profile, as returned by `GET users/me/` and signup.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Store credit available for invoice payments.
    #[serde(default)]
    pub wallet: Decimal,
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Option<CategoryId>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Product {
    /// Whether the product can be added to a cart right now.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.is_active && self.stock > 0
    }
}

/// A product category. Top-level categories carry their subtree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "parentCategory")]
    pub parent_category: Option<CategoryId>,
    #[serde(default)]
    pub children: Vec<Category>,
}

impl Category {
    /// Depth-first walk of this category and its descendants, paired with
    /// their depth below `self`.
    #[must_use]
    pub fn flatten(&self) -> Vec<(usize, &Self)> {
        let mut out = Vec::new();
        let mut stack = vec![(0, self)];
        while let Some((depth, category)) = stack.pop() {
            out.push((depth, category));
            stack.extend(category.children.iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }
}

/// Body of `PATCH products/{id}/stock/`.
#[derive(Serialize)]
pub(crate) struct StockUpdate {
    pub stock: u32,
}

/// Editable product fields, sent by `POST products/` and `PUT products/{id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
}

impl ProductDraft {
    /// A draft with trimmed text fields and no stock or category.
    #[must_use]
    pub fn new(name: &str, description: &str, price: Decimal) -> Self {
        Self {
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            price,
            stock: None,
            category: None,
        }
    }

    /// Problems that would make the backend reject this draft.
    #[must_use]
    pub fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.name.is_empty() {
            problems.push("a name");
        }
        if self.price <= Decimal::ZERO {
            problems.push("a price above zero");
        }
        problems
    }
}

impl From<&Product> for ProductDraft {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: Some(product.stock),
            category: product.category.clone(),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The server-held cart of the current customer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cart {
    pub id: CartId,
    /// Lines in insertion order, at most one per product.
    #[serde(default)]
    pub items: Vec<CartLineItem>,
    #[serde(default)]
    pub total_items: u32,
    #[serde(default)]
    pub total: Decimal,
}

impl Cart {
    /// The line for `product`, if the cart holds it.
    #[must_use]
    pub fn line(&self, product: &ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.product == product)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartLineItem {
    pub id: CartItemId,
    pub product: ProductId,
    #[serde(default)]
    pub product_name: String,
    /// Price captured when the line was created.
    #[serde(rename = "product_price")]
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub subtotal: Decimal,
}

/// Body of the add and update cart item calls.
#[derive(Debug, Serialize)]
pub(crate) struct CartItemRequest<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
}

// =============================================================================
// Orders
// =============================================================================

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingInfo {
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

impl ShippingInfo {
    /// Names of the fields left blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("address", &self.address),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Body of `POST orders/`.
#[derive(Debug, Serialize)]
pub(crate) struct PlaceOrderRequest<'a> {
    pub shipping_full_name: &'a str,
    pub shipping_address: &'a str,
    pub shipping_city: &'a str,
    pub shipping_postal_code: &'a str,
    pub pay_now: bool,
}

impl<'a> PlaceOrderRequest<'a> {
    pub(crate) fn new(shipping: &'a ShippingInfo, pay_now: bool) -> Self {
        Self {
            shipping_full_name: shipping.full_name.trim(),
            shipping_address: shipping.address.trim(),
            shipping_city: shipping.city.trim(),
            shipping_postal_code: shipping.postal_code.trim(),
            pay_now,
        }
    }
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderItem {
    #[serde(default, alias = "product_id")]
    pub product: Option<ProductId>,
    #[serde(default)]
    pub product_name: String,
    pub quantity: u32,
    /// Unit price at the time of purchase.
    #[serde(default)]
    pub price: Decimal,
}

/// An invoice is referenced either by id or embedded in full.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InvoiceRef {
    Full(Box<Invoice>),
    Id(InvoiceId),
}

impl InvoiceRef {
    #[must_use]
    pub const fn id(&self) -> &InvoiceId {
        match self {
            Self::Full(invoice) => &invoice.id,
            Self::Id(id) => id,
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub user: Option<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: OrderStatus,
    pub total: Decimal,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_full_name: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub shipping_city: Option<String>,
    #[serde(default)]
    pub shipping_postal_code: Option<String>,
    /// `paid` or `pending` when the backend reports it directly.
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub invoice: Option<InvoiceRef>,
    #[serde(default)]
    pub shipment: Option<Shipment>,
}

/// A bill for an order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    #[serde(default)]
    pub invoice_number: String,
    pub amount_due: Decimal,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
}

impl Invoice {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// The due date, if present and parseable. Accepts a bare date or a
    /// timestamp.
    #[must_use]
    pub fn due_on(&self) -> Option<NaiveDate> {
        let raw = self.due_date.as_deref()?;
        raw.get(..10)
            .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
    }

    /// Pending and past its due date as of `today`.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Pending && self.due_on().is_some_and(|due| due < today)
    }
}

/// Proof of an invoice payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    #[serde(default)]
    pub receipt_number: String,
    pub amount_paid: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Dashboards
// =============================================================================

/// A shipment of an order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    #[serde(default)]
    pub tracking_number: String,
    #[serde(default)]
    pub status: ShipmentStatus,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub estimated_delivery: Option<String>,
    #[serde(default)]
    pub actual_delivery: Option<String>,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

/// Response of `GET shipments/dashboard/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShipmentDashboard {
    #[serde(default)]
    pub total_shipments: u64,
    #[serde(default)]
    pub status_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub pending_shipments: u64,
    #[serde(default)]
    pub in_transit_shipments: u64,
    #[serde(default)]
    pub delivered_shipments: u64,
    #[serde(default)]
    pub recent_shipments: Vec<Shipment>,
}

/// Headline figures of a sales report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SalesSummary {
    #[serde(default)]
    pub period_start: Option<String>,
    #[serde(default)]
    pub period_end: Option<String>,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub total_revenue: Decimal,
    #[serde(default)]
    pub total_items_sold: u64,
    #[serde(default)]
    pub average_order_value: Decimal,
}

/// Sales within one period bucket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeriodSales {
    pub period: String,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub total_sales: Decimal,
}

/// A best-selling product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub total_quantity: u64,
    #[serde(default)]
    pub total_revenue: Decimal,
}

/// Response of `GET analytics/sales/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SalesAnalytics {
    #[serde(default)]
    pub summary: SalesSummary,
    #[serde(default)]
    pub sales_by_period: Vec<PeriodSales>,
    #[serde(default)]
    pub top_products: Vec<TopProduct>,
}

impl SalesAnalytics {
    /// One-line headline for terminal output.
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "{} orders, {} revenue, {} average",
            self.summary.total_orders,
            format_money(self.summary.total_revenue),
            format_money(self.summary.average_order_value)
        )
    }
}
