//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::Quantity;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, items: vec![], created_at: now, updated_at: now }
    }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Adds to the existing line for `product_id`, or appends a new line.
    pub fn add_item(&mut self, product_id: Uuid, quantity: Quantity) -> CartItem {
        let now = Utc::now();
        self.updated_at = now;
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing.quantity.add(quantity);
            existing.updated_at = now;
            return existing.clone();
        }
        let item = CartItem { id: Uuid::now_v7(), cart_id: self.id, product_id, quantity, created_at: now, updated_at: now };
        self.items.push(item.clone());
        item
    }

    pub fn set_quantity(&mut self, item_id: Uuid, quantity: Quantity) -> Option<CartItem> {
        let item = self.items.iter_mut().find(|i| i.id == item_id)?;
        let now = Utc::now();
        item.quantity = quantity;
        item.updated_at = now;
        self.updated_at = now;
        Some(item.clone())
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before { return false; }
        self.updated_at = Utc::now();
        true
    }

    /// Drops every line; the cart itself stays.
    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = Utc::now();
    }
}
