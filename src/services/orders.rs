//! Order placement, history and merchant fulfillment.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Merchant, Order, OrderDraft, OrderLine, OrderStatus, Product, ShippingDetails, User};
use crate::domain::value_objects::{Money, Quantity};
use crate::store::Store;
use crate::{Result, ShopError};

/// One requested line as the client sent it.
#[derive(Debug, Clone)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i64,
    pub price_at_purchase: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub price_at_purchase: Money,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: Money,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    fn build(order: Order, products: &HashMap<Uuid, Product>) -> Self {
        let items = order
            .items
            .into_iter()
            .map(|item| {
                let product = products.get(&item.product_id);
                OrderItemView {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price_at_purchase: item.price_at_purchase,
                    product_name: product.map(|p| p.name.clone()),
                    product_image: product.and_then(|p| p.first_image()).map(str::to_owned),
                }
            })
            .collect();
        Self {
            id: order.id,
            user_id: order.user_id,
            total_price: order.total_price,
            status: order.status,
            shipping: order.shipping,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    /// Joins each line with the product's current name and first image.
    async fn enrich(&self, orders: Vec<Order>) -> Result<Vec<OrderView>> {
        let ids: HashSet<Uuid> = orders.iter().flat_map(|o| o.items.iter().map(|i| i.product_id)).collect();
        let ids: Vec<Uuid> = ids.into_iter().collect();
        let products: HashMap<Uuid, Product> =
            self.store.find_products(&ids).await?.into_iter().map(|p| (p.id, p)).collect();
        Ok(orders.into_iter().map(|o| OrderView::build(o, &products)).collect())
    }

    async fn enrich_one(&self, order: Order) -> Result<OrderView> {
        self.enrich(vec![order])
            .await?
            .pop()
            .ok_or_else(|| ShopError::Internal("order vanished during enrichment".into()))
    }

    async fn owned_product_ids(&self, merchant: &Merchant) -> Result<HashSet<Uuid>> {
        Ok(self.store.products_by_merchant(merchant.id, None).await?.into_iter().map(|p| p.id).collect())
    }

    /// Pays for the requested lines out of the caller's balance and empties their cart.
    ///
    /// Prices are taken from the request as given.
    #[instrument(skip(self, user, lines, shipping), fields(user_id = %user.id, lines = lines.len()))]
    pub async fn create_order(&self, user: &User, lines: Vec<LineRequest>, shipping: ShippingDetails) -> Result<OrderView> {
        let lines = lines
            .into_iter()
            .map(|line| -> Result<OrderLine> {
                Ok(OrderLine {
                    product_id: line.product_id,
                    quantity: Quantity::new(line.quantity)?,
                    price_at_purchase: Money::new(line.price_at_purchase)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let draft = OrderDraft::new(lines, shipping)?;
        let order = self.store.place_order(user.id, draft).await?;
        info!(order_id = %order.id, total = %order.total_price, "order placed");
        self.enrich_one(order).await
    }

    /// The caller's orders, newest first.
    pub async fn my_orders(&self, user: &User) -> Result<Vec<OrderView>> {
        let orders = self.store.orders_for_user(user.id).await?;
        self.enrich(orders).await
    }

    /// Orders containing the merchant's products, each cut down to those lines.
    pub async fn merchant_orders(&self, merchant: &Merchant) -> Result<Vec<OrderView>> {
        let owned = self.owned_product_ids(merchant).await?;
        if owned.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<Uuid> = owned.iter().copied().collect();
        let mut orders = self.store.orders_with_products(&ids).await?;
        for order in &mut orders {
            order.retain_items(&owned);
        }
        self.enrich(orders).await
    }

    /// Overwrites the status of an order holding at least one of the merchant's products.
    #[instrument(skip(self, merchant), fields(merchant_id = %merchant.id))]
    pub async fn update_status(&self, merchant: &Merchant, order_id: Uuid, status: &str) -> Result<OrderView> {
        let mut order = self.store.find_order(order_id).await?.ok_or_else(|| ShopError::not_found("Order"))?;
        let owned = self.owned_product_ids(merchant).await?;
        if !order.contains_any(&owned) {
            return Err(ShopError::NotAuthorized("Not authorized to update this order".into()));
        }
        let status: OrderStatus = status.parse()?;
        let previous = order.set_status(status);
        if previous.is_terminal() && previous != status {
            warn!(order_id = %order.id, from = previous.as_str(), to = status.as_str(), "overwriting a closed order");
        }
        self.store.update_order_status(&order).await?;
        info!(order_id = %order.id, status = status.as_str(), "order status updated");
        self.enrich_one(order).await
    }
}
