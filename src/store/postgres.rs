//! `PostgreSQL` adapter for [`Store`].
//!
//! Queries are checked at runtime (`query_as` over `FromRow` row types), so the
//! crate builds without a live database. Rows are converted into domain types
//! through `TryFrom`; a value the domain rejects is reported as corrupt data.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::Store;
use crate::domain::aggregates::{
    Cart, CartItem, Category, ChatRecord, Merchant, Order, OrderDraft, OrderItem, Product, ProductStatus,
    SearchFilter, ShippingDetails, User,
};
use crate::domain::value_objects::{Money, Page, Quantity};
use crate::{Result, ShopError};

fn corrupt(what: &str, detail: impl std::fmt::Display) -> ShopError {
    ShopError::Storage(format!("invalid {what} in database: {detail}"))
}

fn money(what: &str, value: Decimal) -> Result<Money> {
    Money::new(value).map_err(|e| corrupt(what, e))
}

fn quantity(value: i32) -> Result<Quantity> {
    Quantity::new(i64::from(value)).map_err(|e| corrupt("quantity", e))
}

// =============================================================================
// Row types
// =============================================================================

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ShopError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(|e| corrupt("role", e))?,
            balance: money("balance", row.balance)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MerchantRow {
    id: Uuid,
    user_id: Uuid,
    shop_name: String,
    description: Option<String>,
}

impl From<MerchantRow> for Merchant {
    fn from(row: MerchantRow) -> Self {
        Self { id: row.id, user_id: row.user_id, shop_name: row.shop_name, description: row.description }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self { id: row.id, name: row.name, description: row.description, created_at: row.created_at }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    merchant_id: Uuid,
    category_id: Option<Uuid>,
    name: String,
    description: Option<String>,
    price: Decimal,
    image_paths: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = ShopError;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            merchant_id: row.merchant_id,
            category_id: row.category_id,
            name: row.name,
            description: row.description,
            price: money("price", row.price)?,
            image_paths: row.image_paths,
            status: row.status.parse().map_err(|e| corrupt("product status", e))?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CartItemRow {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = ShopError;

    fn try_from(row: CartItemRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: quantity(row.quantity)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_price: Decimal,
    status: String,
    shipping_address: Option<String>,
    contact_name: Option<String>,
    contact_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            total_price: money("order total", self.total_price)?,
            status: self.status.parse().map_err(|e| corrupt("order status", e))?,
            shipping: ShippingDetails {
                shipping_address: self.shipping_address,
                contact_name: self.contact_name,
                contact_phone: self.contact_phone,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price_at_purchase: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = ShopError;

    fn try_from(row: OrderItemRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: quantity(row.quantity)?,
            price_at_purchase: money("purchase price", row.price_at_purchase)?,
            created_at: row.created_at,
        })
    }
}

fn products(rows: Vec<ProductRow>) -> Result<Vec<Product>> {
    rows.into_iter().map(TryInto::try_into).collect()
}

/// Escapes `LIKE` wildcards so the keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let escaped = keyword.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_user_conflict(e: sqlx::Error) -> ShopError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.constraint() {
            Some("users_username_key") => return ShopError::Conflict("Username already exists".into()),
            Some("users_email_key") => return ShopError::Conflict("Email already exists".into()),
            _ => {}
        }
    }
    ShopError::Database(e)
}

// =============================================================================
// Store
// =============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &SecretString) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self { pool })
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ShopError::Storage(format!("migration failed: {e}")))
    }

    async fn cart_items(&self, cart_id: Uuid) -> Result<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartItemRow>("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id")
            .bind(cart_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Attaches every line to its order, keeping the row order of `rows`.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY created_at, id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let item = OrderItem::try_from(row)?;
            by_order.entry(item.order_id).or_default().push(item);
        }
        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User, merchant: Option<&Merchant>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, balance, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.balance.amount())
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_user_conflict)?;

        if let Some(m) = merchant {
            sqlx::query("INSERT INTO merchants (id, user_id, shop_name, description) VALUES ($1, $2, $3, $4)")
                .bind(m.id)
                .bind(m.user_id)
                .bind(&m.shop_name)
                .bind(&m.description)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn merchant_for_user(&self, user_id: Uuid) -> Result<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>("SELECT * FROM merchants WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_merchant(&self, id: Uuid) -> Result<Option<Merchant>> {
        let row = sqlx::query_as::<_, MerchantRow>("SELECT * FROM merchants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn update_merchant(&self, merchant: &Merchant) -> Result<()> {
        let done = sqlx::query("UPDATE merchants SET shop_name = $2, description = $3 WHERE id = $1")
            .bind(merchant.id)
            .bind(&merchant.shop_name)
            .bind(&merchant.description)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 { return Err(ShopError::not_found("Merchant")); }
        Ok(())
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, description, created_at) VALUES ($1, $2, $3, $4)")
            .bind(category.id)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, merchant_id, category_id, name, description, price, image_paths, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(product.id)
        .bind(product.merchant_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(&product.image_paths)
        .bind(product.status.as_str())
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let done = sqlx::query(
            "UPDATE products SET category_id = $2, name = $3, description = $4, price = $5, \
             image_paths = $6, status = $7 WHERE id = $1",
        )
        .bind(product.id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(&product.image_paths)
        .bind(product.status.as_str())
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 { return Err(ShopError::not_found("Product")); }
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        products(rows)
    }

    async fn list_products(&self, status: Option<ProductStatus>, page: Page) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at, id OFFSET $2 LIMIT $3",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        products(rows)
    }

    async fn products_by_merchant(&self, merchant_id: Uuid, status: Option<ProductStatus>) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT * FROM products WHERE merchant_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY created_at, id",
        )
        .bind(merchant_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        products(rows)
    }

    async fn search_products(&self, filter: &SearchFilter, page: Page) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"SELECT * FROM products
              WHERE status = 'online'
                AND ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\' OR description ILIKE $1 ESCAPE '\')
                AND ($2::NUMERIC IS NULL OR price >= $2)
                AND ($3::NUMERIC IS NULL OR price <= $3)
                AND ($4::UUID IS NULL OR category_id = $4)
              ORDER BY created_at, id
              OFFSET $5 LIMIT $6",
        )
        .bind(filter.keyword().map(like_pattern))
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.category_id)
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        products(rows)
    }

    async fn cart_for_user(&self, user_id: Uuid) -> Result<Cart> {
        sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
            .bind(Uuid::now_v7())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let items = self.cart_items(row.id).await?;
        Ok(Cart { id: row.id, user_id: row.user_id, items, created_at: row.created_at, updated_at: row.updated_at })
    }

    async fn add_cart_item(&self, cart_id: Uuid, product_id: Uuid, quantity: Quantity) -> Result<CartItem> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, CartItemRow>(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (cart_id, product_id) DO UPDATE \
             SET quantity = LEAST(cart_items.quantity::BIGINT + EXCLUDED.quantity, 2147483647)::INTEGER, \
                 updated_at = NOW() \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1").bind(cart_id).execute(&mut *tx).await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn update_cart_item(&self, cart_id: Uuid, item_id: Uuid, quantity: Quantity) -> Result<Option<CartItem>> {
        let row = sqlx::query_as::<_, CartItemRow>(
            "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE id = $2 AND cart_id = $1 RETURNING *",
        )
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn remove_cart_item(&self, cart_id: Uuid, item_id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM cart_items WHERE id = $2 AND cart_id = $1")
            .bind(cart_id)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn clear_cart(&self, cart_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn place_order(&self, user_id: Uuid, draft: OrderDraft) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent orders from the same account.
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ShopError::not_found("User"))?;
        let mut user = User::try_from(row)?;
        user.debit(draft.total())?;

        let order = Order::place(user_id, draft);
        sqlx::query("UPDATE users SET balance = $2 WHERE id = $1")
            .bind(user_id)
            .bind(user.balance.amount())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO orders (id, user_id, total_price, status, shipping_address, contact_name, contact_phone, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total_price.amount())
        .bind(order.status.as_str())
        .bind(&order.shipping.shipping_address)
        .bind(&order.shipping.contact_name)
        .bind(&order.shipping.contact_phone)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;
        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price_at_purchase, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity.as_i32())
            .bind(item.price_at_purchase.amount())
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.with_items(rows).await?.pop())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.with_items(rows).await
    }

    async fn orders_with_products(&self, product_ids: &[Uuid]) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT o.* FROM orders o \
             WHERE EXISTS (SELECT 1 FROM order_items i WHERE i.order_id = o.id AND i.product_id = ANY($1)) \
             ORDER BY o.created_at DESC, o.id DESC",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;
        self.with_items(rows).await
    }

    async fn update_order_status(&self, order: &Order) -> Result<()> {
        let done = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id)
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 { return Err(ShopError::not_found("Order")); }
        Ok(())
    }

    async fn insert_chat_record(&self, record: &ChatRecord) -> Result<()> {
        sqlx::query("INSERT INTO chat_history (id, user_id, merchant_id, messages, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.merchant_id)
            .bind(Json(&record.messages))
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
