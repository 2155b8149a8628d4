//! # Transaction Module
//!
//! Deposit, withdrawal and emergency-fund requests.
//!
//! A transaction is created `pending` and moves exactly once to `approved`
//! (mutating the ledger) or `rejected` (no ledger effect).

use crate::error::{ensure_positive, CoreError, CoreResult};
use crate::ledger::{Account, EmergencyFund};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Credits the member's savings account
    Deposit,
    /// Debits the member's savings account
    Withdrawal,
    /// Contribution to the emergency fund
    Emergency,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Emergency => "emergency",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "emergency" => Some(TransactionType::Emergency),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "approved" => Some(TransactionStatus::Approved),
            "rejected" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Channel the money came through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    #[default]
    Mpesa,
    Cash,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSource::Mpesa => "mpesa",
            TransactionSource::Cash => "cash",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mpesa" => Some(TransactionSource::Mpesa),
            "cash" => Some(TransactionSource::Cash),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request to record a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub member_id: String,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    #[serde(default)]
    pub source: TransactionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Owner of the account being moved
    pub member_id: String,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub created_by: Option<String>,
    /// Account balance right after approval, zero until then
    pub balance_after: Decimal,
    pub source: TransactionSource,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn create(
        new_tx: NewTransaction,
        created_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        ensure_positive(new_tx.amount, "amount")?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: new_tx.member_id,
            tx_type: new_tx.tx_type,
            amount: new_tx.amount,
            status: TransactionStatus::Pending,
            created_by: created_by.map(str::to_string),
            balance_after: Decimal::ZERO,
            source: new_tx.source,
            created_at: now,
            decided_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Whether approval touches the emergency fund
    pub fn requires_fund(&self) -> bool {
        self.tx_type == TransactionType::Emergency
    }

    fn ensure_pending(&self) -> CoreResult<()> {
        if !self.is_pending() {
            return Err(CoreError::already_processed(
                "Transaction",
                self.status.as_str(),
            ));
        }
        Ok(())
    }

    /// Applies the ledger effect and marks the transaction approved.
    ///
    /// `fund` is only consulted for emergency transactions. Nothing is
    /// mutated when an error is returned.
    pub fn approve(
        &mut self,
        account: &mut Account,
        fund: Option<&mut EmergencyFund>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.ensure_pending()?;
        if account.member_id != self.member_id {
            return Err(CoreError::validation(format!(
                "account {} does not belong to transaction owner {}",
                account.member_id, self.member_id
            )));
        }

        match self.tx_type {
            TransactionType::Deposit => {
                account.credit(self.amount, now)?;
            }
            TransactionType::Withdrawal => {
                account.debit(self.amount, now)?;
            }
            TransactionType::Emergency => {
                let fund = fund.ok_or_else(|| CoreError::not_found("EmergencyFund", "default"))?;
                fund.credit(self.amount, now)?;
            }
        }

        self.balance_after = account.balance();
        self.status = TransactionStatus::Approved;
        self.decided_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Rejected;
        self.decided_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::EMERGENCY_FUND_ID;
    use rust_decimal_macros::dec;

    fn pending(tx_type: TransactionType, amount: Decimal) -> Transaction {
        Transaction::create(
            NewTransaction {
                member_id: "M1".to_string(),
                tx_type,
                amount,
                source: TransactionSource::Cash,
            },
            Some("SEC"),
            Utc::now(),
        )
        .unwrap()
    }

    fn account_with(balance: Decimal) -> Account {
        Account::restore("M1".to_string(), balance, Utc::now(), 0).unwrap()
    }

    #[test]
    fn test_create_requires_positive_amount() {
        let result = Transaction::create(
            NewTransaction {
                member_id: "M1".to_string(),
                tx_type: TransactionType::Deposit,
                amount: dec!(0),
                source: TransactionSource::default(),
            },
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_deposit_approval_snapshots_balance() {
        let mut account = account_with(dec!(100));
        let mut tx = pending(TransactionType::Deposit, dec!(250));
        assert_eq!(tx.balance_after, dec!(0));

        tx.approve(&mut account, None, Utc::now()).unwrap();

        assert_eq!(account.balance(), dec!(350));
        assert_eq!(tx.balance_after, dec!(350));
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert!(tx.decided_at.is_some());
    }

    #[test]
    fn test_withdrawal_insufficient_funds() {
        let mut account = account_with(dec!(300));
        let mut tx = pending(TransactionType::Withdrawal, dec!(500));

        let err = tx.approve(&mut account, None, Utc::now()).unwrap_err();

        assert!(err.is_insufficient_funds());
        assert_eq!(account.balance(), dec!(300));
        assert!(tx.is_pending());
    }

    #[test]
    fn test_double_approval_applies_once() {
        let mut account = account_with(dec!(0));
        let mut tx = pending(TransactionType::Deposit, dec!(40));

        tx.approve(&mut account, None, Utc::now()).unwrap();
        let err = tx.approve(&mut account, None, Utc::now()).unwrap_err();

        assert!(err.is_already_processed());
        assert_eq!(account.balance(), dec!(40));
    }

    #[test]
    fn test_reject_and_approve_are_exclusive() {
        let mut account = account_with(dec!(0));
        let mut tx = pending(TransactionType::Deposit, dec!(40));

        tx.reject(Utc::now()).unwrap();
        assert!(tx.approve(&mut account, None, Utc::now()).is_err());
        assert!(tx.reject(Utc::now()).unwrap_err().is_already_processed());
        assert_eq!(account.balance(), dec!(0));
    }

    #[test]
    fn test_emergency_credits_fund_only() {
        let mut account = account_with(dec!(10));
        let mut fund = EmergencyFund::restore(EMERGENCY_FUND_ID, dec!(5), Utc::now(), 0).unwrap();
        let mut tx = pending(TransactionType::Emergency, dec!(20));
        assert!(tx.requires_fund());

        tx.approve(&mut account, Some(&mut fund), Utc::now()).unwrap();

        assert_eq!(fund.balance(), dec!(25));
        assert_eq!(account.balance(), dec!(10));
        assert_eq!(tx.balance_after, dec!(10));
    }

    #[test]
    fn test_emergency_without_fund() {
        let mut account = account_with(dec!(10));
        let mut tx = pending(TransactionType::Emergency, dec!(20));

        let err = tx.approve(&mut account, None, Utc::now()).unwrap_err();
        assert!(err.is_not_found());
        assert!(tx.is_pending());
    }

    #[test]
    fn test_approve_with_wrong_account() {
        let mut account = Account::open("M2", Utc::now());
        let mut tx = pending(TransactionType::Deposit, dec!(20));

        assert!(tx.approve(&mut account, None, Utc::now()).is_err());
        assert_eq!(account.balance(), dec!(0));
    }
}
