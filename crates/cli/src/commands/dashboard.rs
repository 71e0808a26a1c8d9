//! Staff dashboards.

use shopfront_client::api::DateRange;
use shopfront_client::{ClientError, Shop};
use shopfront_core::format_money;

/// Print the shipment dashboard.
///
/// # Errors
///
/// Returns an error without the shipment capability or if the fetch fails.
#[allow(clippy::print_stdout)]
pub async fn shipments(shop: &Shop) -> Result<(), ClientError> {
    let dashboard = shop.dashboards().shipments().await?;

    println!("Shipments: {}", dashboard.total_shipments);
    println!(
        "  pending {}, in transit {}, delivered {}",
        dashboard.pending_shipments, dashboard.in_transit_shipments, dashboard.delivered_shipments
    );
    for (status, count) in &dashboard.status_counts {
        println!("  {status}: {count}");
    }

    if !dashboard.recent_shipments.is_empty() {
        println!("Recent:");
        for shipment in &dashboard.recent_shipments {
            println!(
                "  {:<16} {:<12} {}",
                shipment.tracking_number, shipment.carrier, shipment.status
            );
        }
    }
    Ok(())
}

/// Print the sales report for an optional date range.
///
/// # Errors
///
/// Returns an error without the analytics capability or if the fetch fails.
#[allow(clippy::print_stdout)]
pub async fn sales(
    shop: &Shop,
    from: Option<String>,
    to: Option<String>,
) -> Result<(), ClientError> {
    let range = DateRange {
        start: from,
        end: to,
    };
    let report = shop.dashboards().sales(&range).await?;

    println!("{}", report.headline());
    println!("Items sold: {}", report.summary.total_items_sold);

    if !report.sales_by_period.is_empty() {
        println!("By period:");
        for period in &report.sales_by_period {
            println!(
                "  {:<12} {:>5} orders {:>12}",
                period.period,
                period.total_orders,
                format_money(period.total_sales)
            );
        }
    }

    if !report.top_products.is_empty() {
        println!("Top products:");
        for product in &report.top_products {
            println!(
                "  {:<30} {:>5} sold {:>12}",
                product.product_name,
                product.total_quantity,
                format_money(product.total_revenue)
            );
        }
    }
    Ok(())
}
