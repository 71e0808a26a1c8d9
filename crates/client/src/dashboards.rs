//! Staff dashboards.

use tracing::instrument;

use shopfront_core::Capability;

use crate::api::{Api, DateRange, SalesAnalytics, ShipmentDashboard};
use crate::error::{ClientError, require};

/// Role-gated reporting endpoints.
#[derive(Debug, Clone)]
pub struct Dashboards {
    api: Api,
}

impl Dashboards {
    #[must_use]
    pub const fn new(api: Api) -> Self {
        Self { api }
    }

    /// Shipment counts and recent shipments.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `ViewShipments` (no request is sent),
    /// otherwise the backend error.
    #[instrument(skip(self))]
    pub async fn shipments(&self) -> Result<ShipmentDashboard, ClientError> {
        require(&self.api.session().snapshot(), Capability::ViewShipments)?;
        Ok(self.api.shipment_dashboard().await?)
    }

    /// Sales figures for `range`. An open range means the backend default.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `ViewAnalytics` (no request is sent),
    /// otherwise the backend error.
    #[instrument(skip(self))]
    pub async fn sales(&self, range: &DateRange) -> Result<SalesAnalytics, ClientError> {
        require(&self.api.session().snapshot(), Capability::ViewAnalytics)?;
        Ok(self.api.sales_analytics(range).await?)
    }
}
