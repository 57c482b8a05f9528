//! In-process [`Store`] used by tests and database-less local runs.
//!
//! Every table sits behind one mutex, so each call is atomic with respect to
//! every other call.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::Store;
use crate::domain::aggregates::{
    Cart, CartItem, Category, ChatRecord, Merchant, Order, OrderDraft, Product, ProductStatus, SearchFilter, User,
};
use crate::domain::value_objects::{Page, Quantity};
use crate::{Result, ShopError};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    merchants: Vec<Merchant>,
    categories: Vec<Category>,
    products: Vec<Product>,
    carts: Vec<Cart>,
    orders: Vec<Order>,
    chats: Vec<ChatRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| ShopError::Storage("memory store lock poisoned".into()))
    }

    /// Stored chat exchanges, oldest first.
    pub fn chat_records(&self) -> Result<Vec<ChatRecord>> {
        Ok(self.lock()?.chats.clone())
    }
}

/// Newest first; among equal timestamps the later insert wins.
fn newest_first<'a>(orders: impl DoubleEndedIterator<Item = &'a Order>) -> Vec<Order> {
    let mut out: Vec<Order> = orders.rev().cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User, merchant: Option<&Merchant>) -> Result<()> {
        let mut db = self.lock()?;
        if db.users.iter().any(|u| u.username == user.username) {
            return Err(ShopError::Conflict("Username already exists".into()));
        }
        if db.users.iter().any(|u| u.email == user.email) {
            return Err(ShopError::Conflict("Email already exists".into()));
        }
        db.users.push(user.clone());
        if let Some(merchant) = merchant { db.merchants.push(merchant.clone()); }
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.username == username).cloned())
    }

    async fn merchant_for_user(&self, user_id: Uuid) -> Result<Option<Merchant>> {
        Ok(self.lock()?.merchants.iter().find(|m| m.user_id == user_id).cloned())
    }

    async fn find_merchant(&self, id: Uuid) -> Result<Option<Merchant>> {
        Ok(self.lock()?.merchants.iter().find(|m| m.id == id).cloned())
    }

    async fn update_merchant(&self, merchant: &Merchant) -> Result<()> {
        let mut db = self.lock()?;
        let slot = db.merchants.iter_mut().find(|m| m.id == merchant.id).ok_or_else(|| ShopError::not_found("Merchant"))?;
        *slot = merchant.clone();
        Ok(())
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        self.lock()?.categories.push(category.clone());
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.lock()?.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.lock()?.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        self.lock()?.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut db = self.lock()?;
        let slot = db.products.iter_mut().find(|p| p.id == product.id).ok_or_else(|| ShopError::not_found("Product"))?;
        *slot = product.clone();
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<()> {
        let mut db = self.lock()?;
        db.products.retain(|p| p.id != id);
        for cart in &mut db.carts {
            cart.items.retain(|i| i.product_id != id);
        }
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.lock()?.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        Ok(self.lock()?.products.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn list_products(&self, status: Option<ProductStatus>, page: Page) -> Result<Vec<Product>> {
        let db = self.lock()?;
        Ok(page.apply(db.products.iter().filter(|p| status.map_or(true, |s| p.status == s)).cloned()))
    }

    async fn products_by_merchant(&self, merchant_id: Uuid, status: Option<ProductStatus>) -> Result<Vec<Product>> {
        let db = self.lock()?;
        Ok(db.products.iter()
            .filter(|p| p.is_owned_by(merchant_id) && status.map_or(true, |s| p.status == s))
            .cloned()
            .collect())
    }

    async fn search_products(&self, filter: &SearchFilter, page: Page) -> Result<Vec<Product>> {
        let db = self.lock()?;
        Ok(page.apply(db.products.iter().filter(|p| filter.matches(p)).cloned()))
    }

    async fn cart_for_user(&self, user_id: Uuid) -> Result<Cart> {
        let mut db = self.lock()?;
        if let Some(cart) = db.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let cart = Cart::new(user_id);
        db.carts.push(cart.clone());
        Ok(cart)
    }

    async fn add_cart_item(&self, cart_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartItem> {
        let mut db = self.lock()?;
        let cart = db.carts.iter_mut().find(|c| c.id == cart_id).ok_or_else(|| ShopError::not_found("Cart"))?;
        Ok(cart.add_item(product_id, quantity))
    }

    async fn update_cart_item(&self, cart_id: Uuid, item_id: Uuid, quantity: Quantity) -> Result<Option<CartItem>> {
        let mut db = self.lock()?;
        Ok(db.carts.iter_mut().find(|c| c.id == cart_id).and_then(|c| c.set_quantity(item_id, quantity)))
    }

    async fn remove_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> Result<bool> {
        let mut db = self.lock()?;
        Ok(db.carts.iter_mut().find(|c| c.id == cart_id).is_some_and(|c| c.remove_item(item_id)))
    }

    async fn clear_cart(&self, cart_id: Uuid) -> Result<()> {
        let mut db = self.lock()?;
        if let Some(cart) = db.carts.iter_mut().find(|c| c.id == cart_id) { cart.clear(); }
        Ok(())
    }

    async fn place_order(&self, user_id: Uuid, draft: OrderDraft) -> Result<Order> {
        let mut guard = self.lock()?;
        let db = &mut *guard;
        let user = db.users.iter_mut().find(|u| u.id == user_id).ok_or_else(|| ShopError::not_found("User"))?;
        // Nothing below the debit can fail.
        user.debit(draft.total())?;
        let order = Order::place(user_id, draft);
        if let Some(cart) = db.carts.iter_mut().find(|c| c.user_id == user_id) { cart.clear(); }
        db.orders.push(order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.lock()?.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let db = self.lock()?;
        Ok(newest_first(db.orders.iter().filter(|o| o.user_id == user_id)))
    }

    async fn orders_with_products(&self, product_ids: &[Uuid]) -> Result<Vec<Order>> {
        let db = self.lock()?;
        Ok(newest_first(db.orders.iter().filter(|o| o.items.iter().any(|i| product_ids.contains(&i.product_id)))))
    }

    async fn update_order_status(&self, order: &Order) -> Result<()> {
        let mut db = self.lock()?;
        let slot = db.orders.iter_mut().find(|o| o.id == order.id).ok_or_else(|| ShopError::not_found("Order"))?;
        slot.status = order.status;
        slot.updated_at = order.updated_at;
        Ok(())
    }

    async fn insert_chat_record(&self, record: &ChatRecord) -> Result<()> {
        self.lock()?.chats.push(record.clone());
        Ok(())
    }
}
