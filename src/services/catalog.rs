//! Products, categories and search.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Category, Merchant, NewProduct, Product, ProductPatch, ProductStatus, SearchFilter};
use crate::domain::value_objects::Page;
use crate::store::Store;
use crate::{Result, ShopError};

const NOT_OWNED: &str = "Product not found or unauthorized";

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    async fn ensure_category(&self, category_id: Option<Uuid>) -> Result<()> {
        if let Some(id) = category_id {
            self.store.find_category(id).await?.ok_or_else(|| ShopError::not_found("Category"))?;
        }
        Ok(())
    }

    /// The product, if `merchant` owns it. Missing and foreign products look the same.
    async fn owned_product(&self, merchant: &Merchant, product_id: Uuid) -> Result<Product> {
        match self.store.find_product(product_id).await? {
            Some(product) if product.is_owned_by(merchant.id) => Ok(product),
            _ => Err(ShopError::NotFound(NOT_OWNED.into())),
        }
    }

    // -- products ------------------------------------------------------------

    #[instrument(skip(self, merchant, new), fields(merchant_id = %merchant.id))]
    pub async fn create_product(&self, merchant: &Merchant, new: NewProduct) -> Result<Product> {
        self.ensure_category(new.category_id).await?;
        let product = Product::create(merchant.id, new);
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub async fn list_products(&self, status: Option<ProductStatus>, page: Page) -> Result<Vec<Product>> {
        self.store.list_products(status, page).await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product> {
        self.store.find_product(id).await?.ok_or_else(|| ShopError::not_found("Product"))
    }

    #[instrument(skip(self, merchant, patch), fields(merchant_id = %merchant.id))]
    pub async fn update_product(&self, merchant: &Merchant, id: Uuid, patch: ProductPatch) -> Result<Product> {
        let mut product = self.owned_product(merchant, id).await?;
        self.ensure_category(patch.category_id).await?;
        product.apply(patch);
        self.store.update_product(&product).await?;
        Ok(product)
    }

    #[instrument(skip(self, merchant), fields(merchant_id = %merchant.id))]
    pub async fn delete_product(&self, merchant: &Merchant, id: Uuid) -> Result<()> {
        let product = self.owned_product(merchant, id).await?;
        self.store.delete_product(product.id).await?;
        info!(product_id = %product.id, "product deleted");
        Ok(())
    }

    pub async fn my_products(&self, merchant: &Merchant) -> Result<Vec<Product>> {
        self.store.products_by_merchant(merchant.id, None).await
    }

    /// Product lookup for collaborators that must enforce ownership (uploads).
    pub async fn product_for_owner(&self, merchant: &Merchant, id: Uuid) -> Result<Product> {
        self.owned_product(merchant, id).await
    }

    /// Online products only, whatever the filter.
    pub async fn search(&self, filter: &SearchFilter, page: Page) -> Result<Vec<Product>> {
        self.store.search_products(filter, page).await
    }

    // -- categories ----------------------------------------------------------

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category> {
        self.store.find_category(id).await?.ok_or_else(|| ShopError::not_found("Category"))
    }

    #[instrument(skip(self, description))]
    pub async fn create_category(&self, name: &str, description: Option<String>) -> Result<Category> {
        let category = Category::create(name, description);
        self.store.insert_category(&category).await?;
        Ok(category)
    }
}
