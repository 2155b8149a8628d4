//! # Ledger Module
//!
//! Member savings accounts and the shared emergency fund.
//!
//! Both hold a [`Balance`], a decimal that can never go below zero. The only
//! way to change it is `credit`/`debit`; callers never set a balance directly.

use crate::error::{ensure_positive, CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed id of the emergency fund row, created by the bootstrap migration.
pub const EMERGENCY_FUND_ID: i64 = 1;

/// Non-negative monetary balance.
///
/// # Invariant
/// The inner value is always >= 0, enforced by every constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> CoreResult<Self> {
        if value < Decimal::ZERO {
            return Err(CoreError::validation(format!(
                "balance cannot be negative: {}",
                value
            )));
        }
        Ok(Self(value))
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// New balance after adding `amount` (> 0)
    pub fn credit(&self, amount: Decimal) -> CoreResult<Self> {
        ensure_positive(amount, "amount")?;
        self.0
            .checked_add(amount)
            .map(Self)
            .ok_or_else(|| CoreError::validation("balance overflow"))
    }

    /// New balance after removing `amount` (> 0).
    ///
    /// Fails with `InsufficientFunds` instead of going negative.
    pub fn debit(&self, amount: Decimal) -> CoreResult<Self> {
        ensure_positive(amount, "amount")?;
        if amount > self.0 {
            return Err(CoreError::insufficient_funds(amount, self.0));
        }
        Ok(Self(self.0 - amount))
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Balance::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(balance: Balance) -> Self {
        balance.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Savings account, one per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub member_id: String,
    balance: Balance,
    pub updated_at: DateTime<Utc>,
    /// Optimistic lock counter, bumped by every persisted balance write
    pub version: i64,
}

impl Account {
    /// Empty account for a newly registered member
    pub fn open(member_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            member_id: member_id.to_string(),
            balance: Balance::ZERO,
            updated_at: now,
            version: 0,
        }
    }

    /// Rebuild from storage
    pub fn restore(
        member_id: String,
        balance: Decimal,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> CoreResult<Self> {
        Ok(Self {
            member_id,
            balance: Balance::new(balance)?,
            updated_at,
            version,
        })
    }

    pub fn balance(&self) -> Decimal {
        self.balance.value()
    }

    /// Adds `amount`, returns the new balance
    pub fn credit(&mut self, amount: Decimal, now: DateTime<Utc>) -> CoreResult<Decimal> {
        self.balance = self.balance.credit(amount)?;
        self.updated_at = now;
        Ok(self.balance.value())
    }

    /// Removes `amount`, returns the new balance. Unchanged on failure.
    pub fn debit(&mut self, amount: Decimal, now: DateTime<Utc>) -> CoreResult<Decimal> {
        self.balance = self.balance.debit(amount)?;
        self.updated_at = now;
        Ok(self.balance.value())
    }
}

/// The cooperative's pooled emergency account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyFund {
    pub id: i64,
    balance: Balance,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl EmergencyFund {
    pub fn restore(
        id: i64,
        balance: Decimal,
        updated_at: DateTime<Utc>,
        version: i64,
    ) -> CoreResult<Self> {
        Ok(Self {
            id,
            balance: Balance::new(balance)?,
            updated_at,
            version,
        })
    }

    pub fn balance(&self) -> Decimal {
        self.balance.value()
    }

    pub fn credit(&mut self, amount: Decimal, now: DateTime<Utc>) -> CoreResult<Decimal> {
        self.balance = self.balance.credit(amount)?;
        self.updated_at = now;
        Ok(self.balance.value())
    }

    pub fn debit(&mut self, amount: Decimal, now: DateTime<Utc>) -> CoreResult<Decimal> {
        self.balance = self.balance.debit(amount)?;
        self.updated_at = now;
        Ok(self.balance.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_rejects_negative() {
        assert!(Balance::new(dec!(-0.01)).is_err());
        assert_eq!(Balance::new(dec!(0)).unwrap(), Balance::ZERO);
    }

    #[test]
    fn test_balance_credit_debit() {
        let balance = Balance::new(dec!(300)).unwrap();

        assert_eq!(balance.credit(dec!(200)).unwrap().value(), dec!(500));
        assert_eq!(balance.debit(dec!(300)).unwrap().value(), dec!(0));

        let err = balance.debit(dec!(500)).unwrap_err();
        assert_eq!(err, CoreError::insufficient_funds(dec!(500), dec!(300)));
    }

    #[test]
    fn test_balance_requires_positive_amount() {
        let balance = Balance::new(dec!(10)).unwrap();
        assert!(balance.credit(dec!(0)).is_err());
        assert!(balance.debit(dec!(-1)).is_err());
    }

    #[test]
    fn test_balance_serde_roundtrip() {
        let balance = Balance::new(dec!(12.50)).unwrap();
        let json = serde_json::to_string(&balance).unwrap();
        assert_eq!(json, "\"12.50\"");

        let negative: Result<Balance, _> = serde_json::from_str("\"-1\"");
        assert!(negative.is_err());
    }

    #[test]
    fn test_account_debit_failure_leaves_balance() {
        let now = Utc::now();
        let mut account = Account::restore("M1".to_string(), dec!(300), now, 3).unwrap();

        let err = account.debit(dec!(500), Utc::now()).unwrap_err();
        assert!(err.is_insufficient_funds());
        assert_eq!(account.balance(), dec!(300));
        assert_eq!(account.updated_at, now);
    }

    #[test]
    fn test_account_open_and_credit() {
        let mut account = Account::open("M1", Utc::now());
        assert_eq!(account.balance(), Decimal::ZERO);
        assert_eq!(account.version, 0);

        assert_eq!(account.credit(dec!(1000), Utc::now()).unwrap(), dec!(1000));
        assert_eq!(account.debit(dec!(250), Utc::now()).unwrap(), dec!(750));
    }

    #[test]
    fn test_emergency_fund() {
        let mut fund = EmergencyFund::restore(EMERGENCY_FUND_ID, dec!(0), Utc::now(), 0).unwrap();
        fund.credit(dec!(50), Utc::now()).unwrap();
        assert_eq!(fund.balance(), dec!(50));
        assert!(fund.debit(dec!(51), Utc::now()).unwrap_err().is_insufficient_funds());
    }

    #[test]
    fn test_restore_rejects_negative_balance() {
        assert!(Account::restore("M1".to_string(), dec!(-5), Utc::now(), 0).is_err());
    }
}
