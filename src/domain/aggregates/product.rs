//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::Money;
use crate::ShopError;

/// Only `Online` products are visible to search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Offline, Online }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Offline => "offline", Self::Online => "online" }
    }
}

impl FromStr for ProductStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "online" => Ok(Self::Online),
            _ => Err(ShopError::Validation(format!("Invalid product status '{s}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    /// Relative to the image root, in upload order.
    pub image_paths: Vec<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub category_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
}

impl Product {
    /// New products start offline with no images.
    pub fn create(merchant_id: Uuid, new: NewProduct) -> Self {
        Self {
            id: Uuid::now_v7(), merchant_id, category_id: new.category_id, name: new.name,
            description: new.description, price: new.price, image_paths: vec![],
            status: ProductStatus::Offline, created_at: Utc::now(),
        }
    }

    pub fn is_visible(&self) -> bool { self.status == ProductStatus::Online }
    pub fn is_owned_by(&self, merchant_id: Uuid) -> bool { self.merchant_id == merchant_id }
    pub fn first_image(&self) -> Option<&str> { self.image_paths.first().map(String::as_str) }

    pub fn apply(&mut self, patch: ProductPatch) {
        if let Some(name) = patch.name { self.name = name; }
        if let Some(description) = patch.description { self.description = Some(description); }
        if let Some(price) = patch.price { self.price = price; }
        if let Some(category_id) = patch.category_id { self.category_id = Some(category_id); }
        if let Some(status) = patch.status { self.status = status; }
    }

    /// Removes `path` from the image list; `false` if it was not there.
    pub fn remove_image(&mut self, path: &str) -> bool {
        let before = self.image_paths.len();
        self.image_paths.retain(|p| p != path);
        self.image_paths.len() != before
    }
}

/// Conjunctive search filters. A `None` field places no constraint.
#[derive(Clone, Debug, Default)]
pub struct SearchFilter {
    pub keyword: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
}

impl SearchFilter {
    /// The keyword, ignoring blank input.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_visible() { return false; }
        if let Some(keyword) = self.keyword() {
            let needle = keyword.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&needle);
            let in_description = product.description.as_deref().is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description { return false; }
        }
        let price = product.price.amount();
        if self.min_price.is_some_and(|min| price < min) { return false; }
        if self.max_price.is_some_and(|max| price > max) { return false; }
        if self.category_id.is_some_and(|c| product.category_id != Some(c)) { return false; }
        true
    }
}
