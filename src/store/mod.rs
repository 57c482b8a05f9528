//! Persistence port and its adapters.
//!
//! [`Store`] is the only way services touch state. Two adapters implement it:
//! [`PgStore`] over `PostgreSQL` and [`MemoryStore`] over in-process tables.
//! Both give [`Store::place_order`] the same all-or-nothing behaviour.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartItem, Category, ChatRecord, Merchant, Order, OrderDraft, Product, ProductStatus, SearchFilter, User,
};
use crate::domain::value_objects::{Page, Quantity};
use crate::Result;

#[async_trait]
pub trait Store: Send + Sync {
    // -- accounts ------------------------------------------------------------

    /// Inserts a user, plus its merchant profile when given, as one write.
    ///
    /// Fails with `Conflict` when the username or email is taken.
    async fn insert_user(&self, user: &User, merchant: Option<&Merchant>) -> Result<()>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn merchant_for_user(&self, user_id: Uuid) -> Result<Option<Merchant>>;
    async fn find_merchant(&self, id: Uuid) -> Result<Option<Merchant>>;
    async fn update_merchant(&self, merchant: &Merchant) -> Result<()>;

    // -- catalog -------------------------------------------------------------

    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>>;

    async fn insert_product(&self, product: &Product) -> Result<()>;
    /// Writes every mutable column of an existing product, image list included.
    async fn update_product(&self, product: &Product) -> Result<()>;
    async fn delete_product(&self, id: Uuid) -> Result<()>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    /// Missing ids are skipped.
    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;
    async fn list_products(&self, status: Option<ProductStatus>, page: Page) -> Result<Vec<Product>>;
    async fn products_by_merchant(&self, merchant_id: Uuid, status: Option<ProductStatus>) -> Result<Vec<Product>>;
    /// Online products matching every filter.
    async fn search_products(&self, filter: &SearchFilter, page: Page) -> Result<Vec<Product>>;

    // -- cart ----------------------------------------------------------------

    /// Returns the user's cart, creating an empty one on first access.
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Cart>;
    /// Accumulates into the existing line for the product, if any.
    async fn add_cart_item(&self, cart_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartItem>;
    /// `None` unless `item_id` is a line of `cart_id`.
    async fn update_cart_item(&self, cart_id: Uuid, item_id: Uuid, quantity: Quantity) -> Result<Option<CartItem>>;
    async fn remove_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> Result<bool>;
    async fn clear_cart(&self, cart_id: Uuid) -> Result<()>;

    // -- orders --------------------------------------------------------------

    /// Debits the user's balance by the draft total, records the order and
    /// empties the user's cart, all in one transaction.
    ///
    /// `InsufficientFunds` leaves every row as it was.
    async fn place_order(&self, user_id: Uuid, draft: OrderDraft) -> Result<Order>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
    /// Newest first.
    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    /// Orders with at least one line for any of `product_ids`, newest first, all lines included.
    async fn orders_with_products(&self, product_ids: &[Uuid]) -> Result<Vec<Order>>;
    /// Persists `status` and `updated_at`.
    async fn update_order_status(&self, order: &Order) -> Result<()>;

    // -- chat ----------------------------------------------------------------

    async fn insert_chat_record(&self, record: &ChatRecord) -> Result<()>;
}
