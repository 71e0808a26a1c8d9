//! Order history and invoice payment.

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use shopfront_core::{Capability, InvoiceStatus, OrderStatus, format_money};

use crate::api::{Api, Invoice, InvoiceRef, Order, Receipt};
use crate::error::{ClientError, require};

/// An order together with its invoice, when it has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order: Order,
    pub invoice: Option<Invoice>,
}

impl OrderSummary {
    /// Payment state as shown to the customer.
    #[must_use]
    pub fn payment_label(&self) -> String {
        let payment_status = self.order.payment_status.as_deref();
        let invoice_status = self.invoice.as_ref().map(|invoice| invoice.status);

        if payment_status == Some("paid") || invoice_status == Some(InvoiceStatus::Paid) {
            return "Paid".to_string();
        }
        if payment_status == Some("pending") || invoice_status == Some(InvoiceStatus::Pending) {
            return "Payment Pending".to_string();
        }
        match self.order.status {
            OrderStatus::Other => "Unknown".to_string(),
            status => status.to_string(),
        }
    }

    /// The invoice still awaiting payment, if any.
    #[must_use]
    pub fn payable_invoice(&self) -> Option<&Invoice> {
        self.invoice
            .as_ref()
            .filter(|invoice| invoice.status == InvoiceStatus::Pending)
    }
}

/// The logged-in user's orders.
#[derive(Debug, Clone)]
pub struct Orders {
    api: Api,
}

impl Orders {
    #[must_use]
    pub const fn new(api: Api) -> Self {
        Self { api }
    }

    /// Orders with their invoices attached, newest first.
    ///
    /// Orders that reference an invoice by id have it fetched; a failed
    /// invoice fetch leaves that order without one.
    ///
    /// # Errors
    ///
    /// `NotPermitted` for roles that cannot list orders, otherwise the
    /// backend error of the order listing.
    #[instrument(skip(self))]
    pub async fn history(&self) -> Result<Vec<OrderSummary>, ClientError> {
        let snapshot = self.api.session().snapshot();
        if require(&snapshot, Capability::ViewOwnOrders).is_err() {
            require(&snapshot, Capability::ViewAllOrders)?;
        }

        let orders = self.api.list_orders().await?;
        let mut summaries = Vec::with_capacity(orders.len());

        for order in orders {
            let invoice = match &order.invoice {
                None => None,
                Some(InvoiceRef::Full(invoice)) => Some(invoice.as_ref().clone()),
                Some(InvoiceRef::Id(_)) => self
                    .api
                    .order_invoice(&order.id)
                    .await
                    .inspect_err(|e| warn!(order = %order.id, error = %e, "Invoice unavailable"))
                    .ok()
                    .flatten(),
            };
            summaries.push(OrderSummary { order, invoice });
        }

        summaries.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(summaries)
    }

    /// The user's wallet balance.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn wallet(&self) -> Result<Decimal, ClientError> {
        Ok(self.api.current_user().await?.wallet)
    }

    /// Pay `invoice` from a wallet holding `wallet`.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `PayInvoice`; `Validation` when the invoice is
    /// not pending or the wallet is short (neither sends a request);
    /// otherwise the backend error.
    #[instrument(skip(self, invoice), fields(invoice = %invoice.id))]
    pub async fn pay_invoice(
        &self,
        invoice: &Invoice,
        wallet: Decimal,
    ) -> Result<Receipt, ClientError> {
        require(&self.api.session().snapshot(), Capability::PayInvoice)?;

        if invoice.status != InvoiceStatus::Pending {
            return Err(ClientError::validation(format!(
                "Invoice {} is not awaiting payment",
                invoice.invoice_number
            )));
        }
        if wallet < invoice.amount_due {
            return Err(ClientError::validation(format!(
                "Insufficient wallet balance. Required: {}, Available: {}",
                format_money(invoice.amount_due),
                format_money(wallet)
            )));
        }

        let receipt = self.api.pay_invoice(&invoice.id).await?;
        info!(receipt = %receipt.id, amount = %receipt.amount_paid, "Invoice paid");
        Ok(receipt)
    }
}
