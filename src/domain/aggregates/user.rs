//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::value_objects::Money;
use crate::ShopError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { User, Merchant }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::User => "user", Self::Merchant => "merchant" }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "merchant" => Ok(Self::Merchant),
            _ => Err(ShopError::Validation(format!("Invalid role '{s}': expected 'user' or 'merchant'"))),
        }
    }
}

/// An account. `balance` is the ledger the order workflow debits.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub balance: Money,
}

impl User {
    pub fn register(new: NewUser) -> Self {
        Self {
            id: Uuid::now_v7(), username: new.username, email: new.email, password_hash: new.password_hash,
            role: new.role, balance: new.balance, created_at: Utc::now(),
        }
    }

    pub fn is_merchant(&self) -> bool { self.role == Role::Merchant }

    /// Debits the ledger. On `InsufficientFunds` the balance is left untouched.
    pub fn debit(&mut self, amount: Money) -> Result<(), ShopError> {
        let remaining = self.balance.checked_sub(amount).ok_or(ShopError::InsufficientFunds {
            required: amount,
            available: self.balance,
        })?;
        self.balance = remaining;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn user(balance: i64) -> User {
        User::register(NewUser {
            username: "alice".into(), email: "alice@example.com".into(), password_hash: "x".into(),
            role: Role::User, balance: Money::new(Decimal::from(balance)).unwrap(),
        })
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("merchant".parse::<Role>().unwrap(), Role::Merchant);
        assert_eq!(" USER ".parse::<Role>().unwrap(), Role::User);
        assert!(matches!("admin".parse::<Role>(), Err(ShopError::Validation(_))));
    }

    #[test]
    fn test_debit() {
        let mut u = user(100);
        u.debit(Money::new(Decimal::from(80)).unwrap()).unwrap();
        assert_eq!(u.balance.amount(), Decimal::from(20));
    }

    #[test]
    fn test_debit_short_leaves_balance() {
        let mut u = user(10);
        let err = u.debit(Money::new(Decimal::from(80)).unwrap()).unwrap_err();
        assert!(matches!(err, ShopError::InsufficientFunds { .. }));
        assert_eq!(u.balance.amount(), Decimal::from(10));
    }
}
