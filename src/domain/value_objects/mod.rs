//! Value Objects for the shop

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Non-negative decimal amount: prices, balances and order totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Decimal places kept by the `NUMERIC(20, 2)` money columns.
    pub const SCALE: u32 = 2;

    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount < Decimal::ZERO { return Err(MoneyError::Negative); }
        Self::exact(amount)
    }

    /// Catalog prices must be strictly positive.
    pub fn positive(amount: Decimal) -> Result<Self, MoneyError> {
        if amount <= Decimal::ZERO { return Err(MoneyError::NotPositive); }
        Self::exact(amount)
    }

    fn exact(amount: Decimal) -> Result<Self, MoneyError> {
        let amount = amount.normalize();
        if amount.scale() > Self::SCALE { return Err(MoneyError::Precision); }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal { self.0 }

    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        self.0.checked_add(other.0).map(Money).ok_or(MoneyError::Overflow)
    }

    /// `None` when the result would go below zero.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        let rest = self.0.checked_sub(other.0)?;
        (rest >= Decimal::ZERO).then_some(Money(rest.normalize()))
    }

    pub fn times(&self, qty: Quantity) -> Result<Money, MoneyError> {
        self.0.checked_mul(Decimal::from(qty.get())).map(|v| Money(v.normalize())).ok_or(MoneyError::Overflow)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Money::new(value) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Negative, NotPositive, Precision, Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative => write!(f, "Amount must not be negative"),
            Self::NotPositive => write!(f, "Price must be greater than 0"),
            Self::Precision => write!(f, "Amount must have at most {} decimal places", Money::SCALE),
            Self::Overflow => write!(f, "Amount is out of range"),
        }
    }
}

/// Line-item quantity, always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    /// Upper bound keeps the value representable as a Postgres `INTEGER`.
    pub const MAX: u32 = i32::MAX as u32;

    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 { return Err(QuantityError::NotPositive); }
        match u32::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(QuantityError::TooLarge),
        }
    }

    pub fn one() -> Self { Self(1) }
    pub fn get(&self) -> u32 { self.0 }
    pub fn as_i32(&self) -> i32 { i32::try_from(self.0).unwrap_or(i32::MAX) }

    /// Accumulates, saturating at [`Quantity::MAX`].
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0).min(Self::MAX)) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { NotPositive, TooLarge }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPositive => write!(f, "Quantity must be greater than 0"),
            Self::TooLarge => write!(f, "Quantity is too large"),
        }
    }
}

/// Offset/limit window for list queries. No upper bound on `limit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page { pub offset: i64, pub limit: i64 }

impl Page {
    pub const DEFAULT_LIMIT: u32 = 100;

    pub fn new(skip: Option<u32>, limit: Option<u32>) -> Self {
        Self { offset: i64::from(skip.unwrap_or(0)), limit: i64::from(limit.unwrap_or(Self::DEFAULT_LIMIT)) }
    }

    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(take).collect()
    }
}

impl Default for Page { fn default() -> Self { Self::new(None, None) } }
