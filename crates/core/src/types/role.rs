//! User roles and the capabilities they grant.
//!
//! Every gated operation asks a single question - `role.can(capability)` -
//! instead of comparing role strings at each call site.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a role string is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

/// Permission tier of a storefront user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shopper with a cart and order history.
    #[default]
    Customer,
    /// Full store management, no cart.
    Admin,
    /// Maintains product stock levels.
    InventoryManager,
    /// Tracks shipments.
    ShipmentManager,
    /// Reads sales analytics.
    StatisticsManager,
}

/// An action gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read and mutate the user's own cart.
    ManageCart,
    /// Check out the cart.
    PlaceOrder,
    /// List the user's own orders and invoices.
    ViewOwnOrders,
    /// Pay an invoice from the wallet.
    PayInvoice,
    /// Create, edit, enable and disable products.
    ManageProducts,
    /// Change stock levels.
    ManageInventory,
    /// Open the shipment dashboard.
    ViewShipments,
    /// Open the sales analytics dashboard.
    ViewAnalytics,
    /// List every customer's orders.
    ViewAllOrders,
}

const CUSTOMER: &[Capability] = &[
    Capability::ManageCart,
    Capability::PlaceOrder,
    Capability::ViewOwnOrders,
    Capability::PayInvoice,
];

const ADMIN: &[Capability] = &[
    Capability::ManageProducts,
    Capability::ManageInventory,
    Capability::ViewShipments,
    Capability::ViewAnalytics,
    Capability::ViewAllOrders,
];

const INVENTORY_MANAGER: &[Capability] = &[Capability::ManageInventory];

const SHIPMENT_MANAGER: &[Capability] = &[Capability::ViewShipments];

const STATISTICS_MANAGER: &[Capability] = &[Capability::ViewAnalytics];

impl Role {
    /// All roles, in display order.
    pub const ALL: [Self; 5] = [
        Self::Customer,
        Self::Admin,
        Self::InventoryManager,
        Self::ShipmentManager,
        Self::StatisticsManager,
    ];

    /// The wire/storage name of this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::InventoryManager => "inventory_manager",
            Self::ShipmentManager => "shipment_manager",
            Self::StatisticsManager => "statistics_manager",
        }
    }

    /// The capabilities granted to this role.
    #[must_use]
    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            Self::Customer => CUSTOMER,
            Self::Admin => ADMIN,
            Self::InventoryManager => INVENTORY_MANAGER,
            Self::ShipmentManager => SHIPMENT_MANAGER,
            Self::StatisticsManager => STATISTICS_MANAGER,
        }
    }

    /// Whether this role grants `capability`.
    #[must_use]
    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Only customers own a cart.
    #[must_use]
    pub const fn is_customer(self) -> bool {
        matches!(self, Self::Customer)
    }

    /// Human-readable label for dashboards.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Admin => "Administrator",
            Self::InventoryManager => "Inventory Manager",
            Self::ShipmentManager => "Shipment Manager",
            Self::StatisticsManager => "Statistics Manager",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoleParseError(s.to_string()))
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ManageCart => "manage_cart",
            Self::PlaceOrder => "place_order",
            Self::ViewOwnOrders => "view_own_orders",
            Self::PayInvoice => "pay_invoice",
            Self::ManageProducts => "manage_products",
            Self::ManageInventory => "manage_inventory",
            Self::ViewShipments => "view_shipments",
            Self::ViewAnalytics => "view_analytics",
            Self::ViewAllOrders => "view_all_orders",
        };
        f.write_str(name)
    }
}
