//! Product catalog reads with a short-lived cache, plus the inventory and
//! product management operations of staff roles.
//!
//! Reads are cached with `moka` for the configured TTL. Any write through
//! this type drops the whole cache so the next read sees the new stock.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, info, instrument};

use shopfront_core::{Capability, ProductId};

use crate::api::{Api, Category, Product, ProductDraft};
use crate::error::{ClientError, require};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Products,
    Product(ProductId),
    Categories,
}

#[derive(Debug, Clone)]
enum CacheValue {
    Products(Arc<Vec<Product>>),
    Product(Box<Product>),
    Categories(Arc<Vec<Category>>),
}

/// Cached access to products and categories.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    api: Api,
    cache: Cache<CacheKey, CacheValue>,
}

impl Catalog {
    /// Create a catalog whose reads live for `ttl`.
    #[must_use]
    pub fn new(api: Api, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogInner { api, cache }),
        }
    }

    /// Every product, including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns the backend error on a cache miss.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Arc<Vec<Product>>, ClientError> {
        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products = Arc::new(self.inner.api.list_products().await?);
        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// Products a customer can currently buy.
    ///
    /// # Errors
    ///
    /// Same as [`Self::products`].
    pub async fn purchasable(&self) -> Result<Vec<Product>, ClientError> {
        Ok(self
            .products()
            .await?
            .iter()
            .filter(|p| p.is_purchasable())
            .cloned()
            .collect())
    }

    /// A single product.
    ///
    /// # Errors
    ///
    /// Returns the backend error on a cache miss, including 404.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<Product, ClientError> {
        let key = CacheKey::Product(product_id.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self.inner.api.get_product(product_id).await?;
        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// The category tree.
    ///
    /// # Errors
    ///
    /// Returns the backend error on a cache miss.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, ClientError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(self.inner.api.list_categories().await?);
        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::clone(&categories)),
            )
            .await;
        Ok(categories)
    }

    // =========================================================================
    // Staff operations
    // =========================================================================

    /// Set a product's stock level.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `ManageInventory` (no request is sent),
    /// otherwise the backend error.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn update_stock(
        &self,
        product_id: &ProductId,
        stock: u32,
    ) -> Result<Product, ClientError> {
        require(
            &self.inner.api.session().snapshot(),
            Capability::ManageInventory,
        )?;

        let product = self.inner.api.update_stock(product_id, stock).await?;
        info!(stock = product.stock, "Stock updated");
        self.invalidate_all().await;
        Ok(product)
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `ManageProducts`, `Validation` for a blank
    /// name or a price of zero or less (neither sends a request), otherwise
    /// the backend error.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, ClientError> {
        self.check_draft(draft)?;

        let product = self.inner.api.create_product(draft).await?;
        info!(product = %product.id, "Product created");
        self.invalidate_all().await;
        Ok(product)
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_product`].
    #[instrument(skip(self, draft), fields(product = %product_id))]
    pub async fn update_product(
        &self,
        product_id: &ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, ClientError> {
        self.check_draft(draft)?;

        let product = self.inner.api.update_product(product_id, draft).await?;
        info!("Product updated");
        self.invalidate_all().await;
        Ok(product)
    }

    /// Remove a product from the catalog.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `ManageProducts` (no request is sent),
    /// otherwise the backend error.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), ClientError> {
        require(
            &self.inner.api.session().snapshot(),
            Capability::ManageProducts,
        )?;

        self.inner.api.delete_product(product_id).await?;
        info!("Product deleted");
        self.invalidate_all().await;
        Ok(())
    }

    fn check_draft(&self, draft: &ProductDraft) -> Result<(), ClientError> {
        require(
            &self.inner.api.session().snapshot(),
            Capability::ManageProducts,
        )?;

        let problems = draft.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClientError::validation(format!(
                "A product needs {}",
                problems.join(" and ")
            )))
        }
    }

    /// Show or hide a product in the storefront.
    ///
    /// # Errors
    ///
    /// `NotPermitted` without `ManageProducts` (no request is sent),
    /// otherwise the backend error.
    #[instrument(skip(self), fields(product = %product_id))]
    pub async fn set_product_active(
        &self,
        product_id: &ProductId,
        active: bool,
    ) -> Result<Product, ClientError> {
        require(
            &self.inner.api.session().snapshot(),
            Capability::ManageProducts,
        )?;

        let product = self.inner.api.set_product_active(product_id, active).await?;
        info!(active = product.is_active, "Product visibility changed");
        self.invalidate_all().await;
        Ok(product)
    }

    /// Drop every cached response.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("cached_entries", &self.inner.cache.entry_count())
            .finish_non_exhaustive()
    }
}
