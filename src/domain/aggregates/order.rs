//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::{Money, Quantity};
use crate::ShopError;

/// Fulfillment states, in order. `Cancelled` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] PendingPayment, PendingShipment, Shipped, Completed, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::PendingPayment, Self::PendingShipment, Self::Shipped, Self::Completed, Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PendingShipment => "pending_shipment",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Completed | Self::Cancelled) }
}

impl FromStr for OrderStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|st| st.as_str() == wanted).ok_or_else(|| {
            ShopError::Validation(format!("Invalid order status '{s}'"))
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ShippingDetails {
    pub shipping_address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

/// One requested line. The price is the buyer-supplied purchase price.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub price_at_purchase: Money,
}

/// A validated order request with its total computed.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    lines: Vec<OrderLine>,
    shipping: ShippingDetails,
    total: Money,
}

impl OrderDraft {
    pub fn new(lines: Vec<OrderLine>, shipping: ShippingDetails) -> Result<Self, ShopError> {
        if lines.is_empty() {
            return Err(ShopError::Validation("Order must contain at least one item".into()));
        }
        let total = lines.iter().try_fold(Money::ZERO, |acc, line| {
            line.price_at_purchase.times(line.quantity).and_then(|sub| acc.checked_add(sub))
        })?;
        Ok(Self { lines, shipping, total })
    }

    pub fn total(&self) -> Money { self.total }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub price_at_purchase: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: Money,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Snapshots the draft into an order awaiting payment.
    pub fn place(user_id: Uuid, draft: OrderDraft) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let items = draft.lines.into_iter().map(|line| OrderItem {
            id: Uuid::now_v7(), order_id: id, product_id: line.product_id, quantity: line.quantity,
            price_at_purchase: line.price_at_purchase, created_at: now,
        }).collect();
        Self {
            id, user_id, total_price: draft.total, status: OrderStatus::PendingPayment,
            shipping: draft.shipping, created_at: now, updated_at: now, items,
        }
    }

    /// Overwrites the status without checking the current one. Returns the previous status.
    pub fn set_status(&mut self, status: OrderStatus) -> OrderStatus {
        let previous = std::mem::replace(&mut self.status, status);
        self.updated_at = Utc::now();
        previous
    }

    pub fn contains_any(&self, product_ids: &HashSet<Uuid>) -> bool {
        self.items.iter().any(|i| product_ids.contains(&i.product_id))
    }

    /// Keeps only the lines for `product_ids`.
    pub fn retain_items(&mut self, product_ids: &HashSet<Uuid>) {
        self.items.retain(|i| product_ids.contains(&i.product_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(product_id: Uuid, qty: i64, price: i64) -> OrderLine {
        OrderLine { product_id, quantity: Quantity::new(qty).unwrap(), price_at_purchase: Money::new(Decimal::from(price)).unwrap() }
    }

    #[test]
    fn test_order_workflow() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        let draft = OrderDraft::new(vec![line(a, 2, 40), line(b, 1, 15)], ShippingDetails::default()).unwrap();
        assert_eq!(draft.total().amount(), Decimal::from(95));

        let mut order = Order::place(Uuid::now_v7(), draft);
        assert_eq!(order.status, OrderStatus::PendingPayment);
        let items_total = order.items.iter().fold(Decimal::ZERO, |acc, i| acc + i.price_at_purchase.amount() * Decimal::from(i.quantity.get()));
        assert_eq!(items_total, order.total_price.amount());
        assert!(order.items.iter().all(|i| i.order_id == order.id));

        assert_eq!(order.set_status(OrderStatus::Shipped), OrderStatus::PendingPayment);
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_empty_draft_rejected() {
        assert!(matches!(OrderDraft::new(vec![], ShippingDetails::default()), Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_status_overwrite_is_permissive() {
        let mut order = Order::place(Uuid::now_v7(), OrderDraft::new(vec![line(Uuid::now_v7(), 1, 1)], ShippingDetails::default()).unwrap());
        order.set_status(OrderStatus::Cancelled);
        assert!(order.status.is_terminal());
        order.set_status(OrderStatus::PendingPayment);
        assert_eq!(order.status, OrderStatus::PendingPayment);
    }

    #[test]
    fn test_status_parsing() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!("SHIPPED".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!(matches!("lost".parse::<OrderStatus>(), Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_retain_items_for_merchant() {
        let (mine, theirs) = (Uuid::now_v7(), Uuid::now_v7());
        let draft = OrderDraft::new(vec![line(mine, 1, 10), line(theirs, 1, 20)], ShippingDetails::default()).unwrap();
        let mut order = Order::place(Uuid::now_v7(), draft);
        let owned: HashSet<Uuid> = [mine].into();
        assert!(order.contains_any(&owned));
        order.retain_items(&owned);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total_price.amount(), Decimal::from(30));
    }
}
