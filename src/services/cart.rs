use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem, Product, User};
use crate::domain::value_objects::Quantity;
use crate::store::Store;
use crate::{Result, ShopError};

/// A cart line with the product as it is now; `None` once the product is gone.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Option<Product>,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLineView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn view(&self, user: &User) -> Result<CartView> {
        let cart = self.store.cart_for_user(user.id).await?;
        let ids: Vec<Uuid> = cart.items.iter().map(|i| i.product_id).collect();
        let mut products: HashMap<Uuid, Product> =
            self.store.find_products(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        let Cart { id, user_id, items, created_at, updated_at } = cart;
        let items = items
            .into_iter()
            .map(|item| {
                let product = products.remove(&item.product_id);
                CartLineView { item, product }
            })
            .collect();
        Ok(CartView { id, user_id, items, created_at, updated_at })
    }

    /// Adds `quantity` (default 1) of a product, merging with an existing line.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn add_item(&self, user: &User, product_id: Uuid, quantity: Option<i64>) -> Result<CartItem> {
        let quantity = quantity.map(Quantity::new).transpose()?.unwrap_or_else(Quantity::one);
        self.store.find_product(product_id).await?.ok_or_else(|| ShopError::not_found("Product"))?;
        let cart = self.store.cart_for_user(user.id).await?;
        self.store.add_cart_item(cart.id, product_id, quantity).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update_item(&self, user: &User, item_id: Uuid, quantity: i64) -> Result<CartItem> {
        let cart = self.store.cart_for_user(user.id).await?;
        if !cart.items.iter().any(|i| i.id == item_id) {
            return Err(ShopError::not_found("Cart item"));
        }
        let quantity = Quantity::new(quantity)?;
        self.store
            .update_cart_item(cart.id, item_id, quantity)
            .await?
            .ok_or_else(|| ShopError::not_found("Cart item"))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn remove_item(&self, user: &User, item_id: Uuid) -> Result<()> {
        let cart = self.store.cart_for_user(user.id).await?;
        if !self.store.remove_cart_item(cart.id, item_id).await? {
            return Err(ShopError::not_found("Cart item"));
        }
        Ok(())
    }

    pub async fn clear(&self, user: &User) -> Result<()> {
        let cart = self.store.cart_for_user(user.id).await?;
        self.store.clear_cart(cart.id).await
    }
}
