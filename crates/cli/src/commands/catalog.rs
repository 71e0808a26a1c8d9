//! Catalog browsing and product management.

use rust_decimal::Decimal;

use shopfront_client::api::ProductDraft;
use shopfront_client::{ClientError, Shop};
use shopfront_core::{CategoryId, ProductId, format_money};

/// Fields to change on an existing product. `None` keeps the current value.
#[derive(Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub category: Option<CategoryId>,
}

impl ProductChanges {
    fn apply(self, draft: &mut ProductDraft) {
        if let Some(name) = self.name {
            draft.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            draft.description = description.trim().to_string();
        }
        if let Some(price) = self.price {
            draft.price = price;
        }
        if self.stock.is_some() {
            draft.stock = self.stock;
        }
        if self.category.is_some() {
            draft.category = self.category;
        }
    }
}

/// List products. Without `all`, only purchasable ones.
///
/// # Errors
///
/// Returns the backend error.
#[allow(clippy::print_stdout)]
pub async fn products(shop: &Shop, all: bool) -> Result<(), ClientError> {
    let products = if all {
        shop.catalog().products().await?.as_ref().clone()
    } else {
        shop.catalog().purchasable().await?
    };

    if products.is_empty() {
        println!("No products available");
        return Ok(());
    }

    for product in &products {
        let flag = if product.is_active { "" } else { "  (hidden)" };
        println!(
            "{:>6}  {:<30} {:>10}  stock {:>4}{flag}",
            product.id,
            product.name,
            format_money(product.price),
            product.stock
        );
    }
    Ok(())
}

/// Print the category tree.
///
/// # Errors
///
/// Returns the backend error.
#[allow(clippy::print_stdout)]
pub async fn categories(shop: &Shop) -> Result<(), ClientError> {
    let roots = shop.catalog().categories().await?;
    for root in roots.iter().filter(|c| c.parent_category.is_none()) {
        for (depth, category) in root.flatten() {
            println!("{}{} [{}]", "  ".repeat(depth), category.name, category.id);
        }
    }
    Ok(())
}

/// Set a product's stock level.
///
/// # Errors
///
/// Returns an error without the inventory capability or if the backend
/// refuses.
#[allow(clippy::print_stdout)]
pub async fn set_stock(shop: &Shop, product: &str, stock: u32) -> Result<(), ClientError> {
    let product = shop
        .catalog()
        .update_stock(&ProductId::new(product), stock)
        .await?;
    println!("{} now has {} in stock", product.name, product.stock);
    Ok(())
}

/// Show or hide a product.
///
/// # Errors
///
/// Returns an error without the product-management capability or if the
/// backend refuses.
#[allow(clippy::print_stdout)]
pub async fn set_active(shop: &Shop, product: &str, active: bool) -> Result<(), ClientError> {
    let product = shop
        .catalog()
        .set_product_active(&ProductId::new(product), active)
        .await?;
    let state = if product.is_active { "visible" } else { "hidden" };
    println!("{} is now {state}", product.name);
    Ok(())
}

/// Add a product.
///
/// # Errors
///
/// Returns an error without the product-management capability, for an
/// incomplete draft, or if the backend refuses.
#[allow(clippy::print_stdout)]
pub async fn create(shop: &Shop, draft: &ProductDraft) -> Result<(), ClientError> {
    let product = shop.catalog().create_product(draft).await?;
    println!(
        "Added {} [{}] at {}",
        product.name,
        product.id,
        format_money(product.price)
    );
    Ok(())
}

/// Edit a product, starting from its current fields.
///
/// # Errors
///
/// Same as [`create`], plus the error of reading the current product.
#[allow(clippy::print_stdout)]
pub async fn edit(shop: &Shop, product: &str, changes: ProductChanges) -> Result<(), ClientError> {
    let product_id = ProductId::new(product);
    let current = shop.catalog().product(&product_id).await?;

    let mut draft = ProductDraft::from(&current);
    changes.apply(&mut draft);

    let product = shop.catalog().update_product(&product_id, &draft).await?;
    println!(
        "Updated {} [{}]: {}, stock {}",
        product.name,
        product.id,
        format_money(product.price),
        product.stock
    );
    Ok(())
}

/// Remove a product.
///
/// # Errors
///
/// Returns an error without the product-management capability or if the
/// backend refuses.
#[allow(clippy::print_stdout)]
pub async fn delete(shop: &Shop, product: &str) -> Result<(), ClientError> {
    shop.catalog().delete_product(&ProductId::new(product)).await?;
    println!("Deleted product {product}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_keep_unset_fields() {
        let mut draft = ProductDraft::new("Lamp", "Desk lamp", Decimal::TEN);
        draft.stock = Some(4);

        ProductChanges {
            price: Some(Decimal::ONE),
            name: Some("  Floor lamp ".into()),
            ..ProductChanges::default()
        }
        .apply(&mut draft);

        assert_eq!(draft.name, "Floor lamp");
        assert_eq!(draft.description, "Desk lamp");
        assert_eq!(draft.price, Decimal::ONE);
        assert_eq!(draft.stock, Some(4));
        assert_eq!(draft.category, None);
    }
}
