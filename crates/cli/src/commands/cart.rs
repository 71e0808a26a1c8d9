//! Cart and checkout commands.
//!
//! Every command re-fetches the cart from the backend before printing it,
//! so what is shown is always the server's view.

use shopfront_client::api::{Cart, ShippingInfo};
use shopfront_client::{ClientError, Shop};
use shopfront_core::{ProductId, format_money};

#[allow(clippy::print_stdout)]
fn print_cart(cart: Option<&Cart>) {
    let Some(cart) = cart.filter(|cart| !cart.is_empty()) else {
        println!("Your cart is empty");
        return;
    };

    for item in &cart.items {
        println!(
            "{:>4} x {:<30} {:>10} {:>10}   [{}]",
            item.quantity,
            item.product_name,
            format_money(item.unit_price),
            format_money(item.subtotal),
            item.product
        );
    }
    println!("{} items, total {}", cart.total_items, format_money(cart.total));
}

/// Print the cart.
///
/// # Errors
///
/// Returns an error outside a customer session or if the fetch fails.
pub async fn show(shop: &Shop) -> Result<(), ClientError> {
    let cart = shop.cart().refresh().await?;
    print_cart(cart.as_ref());
    Ok(())
}

/// Add a product and print the updated cart.
///
/// # Errors
///
/// Returns the add or re-fetch error.
pub async fn add(shop: &Shop, product: &str, quantity: u32) -> Result<(), ClientError> {
    let cart = shop
        .cart()
        .add_item(&ProductId::new(product), quantity)
        .await?;
    print_cart(cart.as_ref());
    Ok(())
}

/// Change a line's quantity and print the updated cart.
///
/// # Errors
///
/// Returns the update or re-fetch error.
pub async fn update(shop: &Shop, product: &str, quantity: i64) -> Result<(), ClientError> {
    let cart = shop
        .cart()
        .update_quantity(&ProductId::new(product), quantity)
        .await?;
    print_cart(cart.as_ref());
    Ok(())
}

/// Remove a line and print the updated cart.
///
/// # Errors
///
/// Returns the removal or re-fetch error.
pub async fn remove(shop: &Shop, product: &str) -> Result<(), ClientError> {
    let cart = shop.cart().remove_item(&ProductId::new(product)).await?;
    print_cart(cart.as_ref());
    Ok(())
}

/// Check out.
///
/// # Errors
///
/// Returns an error for an empty cart, missing shipping details or a
/// refused order.
#[allow(clippy::print_stdout)]
pub async fn checkout(
    shop: &Shop,
    shipping: &ShippingInfo,
    pay_now: bool,
) -> Result<(), ClientError> {
    // Checkout validates against the cached cart, which starts empty in a
    // fresh process.
    shop.cart().refresh().await?;

    let order = shop.cart().checkout(shipping, pay_now).await?;
    println!(
        "Order {} placed: {} ({})",
        order.id,
        format_money(order.total),
        order.status
    );
    if !pay_now {
        println!("Pay the invoice from `shopfront orders` when ready.");
    }
    Ok(())
}
