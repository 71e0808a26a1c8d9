//! Order history and invoice payment.

use chrono::Utc;

use shopfront_client::{ClientError, Shop};
use shopfront_core::format_money;

/// List orders, newest first, with invoice and payment state.
///
/// # Errors
///
/// Returns an error for roles without order access or if the listing fails.
#[allow(clippy::print_stdout)]
pub async fn list(shop: &Shop) -> Result<(), ClientError> {
    let history = shop.orders().history().await?;
    if history.is_empty() {
        println!("No orders yet");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    for summary in &history {
        let order = &summary.order;
        println!(
            "Order {}  {}  {}  {}",
            order.id,
            order.created_at.format("%Y-%m-%d"),
            format_money(order.total),
            summary.payment_label()
        );
        for item in &order.items {
            println!("    {} x {}", item.quantity, item.product_name);
        }
        if let Some(invoice) = &summary.invoice {
            let overdue = if invoice.is_overdue(today) { " (overdue)" } else { "" };
            println!(
                "    Invoice {} [{}]: {} due{overdue}",
                invoice.invoice_number,
                invoice.id,
                format_money(invoice.amount_due)
            );
            for receipt in &invoice.receipts {
                println!(
                    "    Receipt {}: {} paid",
                    receipt.receipt_number,
                    format_money(receipt.amount_paid)
                );
            }
        }
        if let Some(shipment) = &order.shipment {
            println!(
                "    Shipment {} via {}: {}",
                shipment.tracking_number, shipment.carrier, shipment.status
            );
        }
    }
    Ok(())
}

/// Pay a pending invoice from the wallet.
///
/// # Errors
///
/// Returns `Validation` when no pending invoice has that id or the wallet is
/// short, otherwise the backend error.
#[allow(clippy::print_stdout)]
pub async fn pay(shop: &Shop, invoice_id: &str) -> Result<(), ClientError> {
    let history = shop.orders().history().await?;
    let invoice = history
        .iter()
        .filter_map(|summary| summary.payable_invoice())
        .find(|invoice| invoice.id.as_str() == invoice_id)
        .ok_or_else(|| {
            ClientError::Validation(format!("No pending invoice with id {invoice_id}"))
        })?;

    let wallet = shop.orders().wallet().await?;
    let receipt = shop.orders().pay_invoice(invoice, wallet).await?;
    println!(
        "Paid {} (receipt {}). Wallet balance: {}",
        format_money(receipt.amount_paid),
        receipt.receipt_number,
        format_money(wallet - receipt.amount_paid)
    );
    Ok(())
}
