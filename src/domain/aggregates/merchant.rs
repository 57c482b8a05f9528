//! Merchant profile, one per merchant account.

use serde::Serialize;
use uuid::Uuid;

use super::user::User;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Merchant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shop_name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MerchantPatch {
    pub shop_name: Option<String>,
    pub description: Option<String>,
}

impl Merchant {
    pub fn for_user(user: &User) -> Self {
        Self { id: Uuid::now_v7(), user_id: user.id, shop_name: format!("{}'s Shop", user.username), description: None }
    }

    pub fn apply(&mut self, patch: MerchantPatch) {
        if let Some(name) = patch.shop_name { self.shop_name = name; }
        if let Some(description) = patch.description { self.description = Some(description); }
    }
}
