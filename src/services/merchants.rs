use std::sync::Arc;

use tracing::instrument;

use crate::domain::aggregates::{Merchant, MerchantPatch, User};
use crate::store::Store;
use crate::{Result, ShopError};

/// Resolves the merchant profile behind a merchant account.
///
/// Non-merchant accounts get `NotAuthorized`; a merchant account without a
/// profile gets `NotFound`.
pub async fn require_merchant(store: &dyn Store, user: &User) -> Result<Merchant> {
    if !user.is_merchant() {
        return Err(ShopError::NotAuthorized("Only merchants can perform this action".into()));
    }
    store
        .merchant_for_user(user.id)
        .await?
        .ok_or_else(|| ShopError::NotFound("Merchant profile not found".into()))
}

#[derive(Clone)]
pub struct MerchantService {
    store: Arc<dyn Store>,
}

impl MerchantService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn profile(&self, user: &User) -> Result<Merchant> {
        require_merchant(self.store.as_ref(), user).await
    }

    #[instrument(skip(self, user, patch), fields(user_id = %user.id))]
    pub async fn update_profile(&self, user: &User, patch: MerchantPatch) -> Result<Merchant> {
        let mut merchant = require_merchant(self.store.as_ref(), user).await?;
        merchant.apply(patch);
        self.store.update_merchant(&merchant).await?;
        Ok(merchant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{NewUser, Role};
    use crate::domain::value_objects::Money;
    use crate::store::MemoryStore;

    fn account(role: Role) -> User {
        User::register(NewUser {
            username: "mia".into(), email: "mia@example.com".into(), password_hash: "x".into(), role, balance: Money::ZERO,
        })
    }

    #[tokio::test]
    async fn test_profile_requires_merchant_role() {
        let store = Arc::new(MemoryStore::new());
        let service = MerchantService::new(store.clone());
        let shopper = account(Role::User);
        store.insert_user(&shopper, None).await.unwrap();
        assert!(matches!(service.profile(&shopper).await, Err(ShopError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let store = Arc::new(MemoryStore::new());
        let service = MerchantService::new(store.clone());
        let owner = account(Role::Merchant);
        store.insert_user(&owner, Some(&Merchant::for_user(&owner))).await.unwrap();

        let updated = service
            .update_profile(&owner, MerchantPatch { description: Some("Oak and walnut".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.shop_name, "mia's Shop");
        assert_eq!(service.profile(&owner).await.unwrap().description.as_deref(), Some("Oak and walnut"));
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let owner = account(Role::Merchant);
        store.insert_user(&owner, None).await.unwrap();
        let err = require_merchant(store.as_ref(), &owner).await.unwrap_err();
        assert_eq!(err.to_string(), "Merchant profile not found");
    }
}
