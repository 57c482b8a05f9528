//! Furniture shop backend
//!
//! Merchants list furniture, shoppers fill a cart and pay for orders out of a
//! simulated account balance, and merchants move those orders through
//! fulfillment.
//!
//! ## Features
//! - Account registration and login with signed bearer tokens
//! - Product catalog management and visibility-scoped search
//! - Shopping cart
//! - Balance-funded order placement and merchant fulfillment
//! - Product image upload
//! - Per-merchant recommendation chat backed by a completion API

pub mod api;
pub mod config;
pub mod domain;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::value_objects::{Money, MoneyError, QuantityError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("Insufficient balance. Required: {required}, Available: {available}")]
    InsufficientFunds { required: Money, available: Money },

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    /// `NotFound` with the conventional "<what> not found" message.
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<QuantityError> for ShopError {
    fn from(error: QuantityError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<MoneyError> for ShopError {
    fn from(error: MoneyError) -> Self {
        Self::Validation(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;
