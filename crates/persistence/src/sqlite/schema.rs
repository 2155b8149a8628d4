//! Database schema definitions
//!
//! Row types for sqlx mapping from SQLite tables, and their conversion into
//! domain types. Schema is defined in migrations/20261019_init.sql

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sacco_core::{
    Account, EmergencyFund, GuarantorAction, GuarantorDecision, LoanRepayment, LoanRequest,
    LoanStatus, Member, MemberStatus, PasswordResetOtp, RepaymentMethod, RepaymentStatus, Role,
    Transaction, TransactionSource, TransactionStatus, TransactionType, TreasurerDecision,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Parse a TEXT decimal column
pub fn parse_decimal(field: &str, value: &str) -> PersistenceResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| PersistenceError::InvalidDecimal(format!("{} = {:?}: {}", field, value, e)))
}

fn parse_enum<T>(field: &str, value: &str, parse: fn(&str) -> Option<T>) -> PersistenceResult<T> {
    parse(value).ok_or_else(|| PersistenceError::invalid_enum(field, value))
}

fn parse_optional_enum<T>(
    field: &str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> PersistenceResult<Option<T>> {
    value.map(|v| parse_enum(field, v, parse)).transpose()
}

/// Row type for table `members`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MemberRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Row type for table `accounts`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AccountRow {
    pub member_id: String,
    pub balance: String, // Decimal stored as TEXT
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Row type for table `emergency_fund`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct EmergencyFundRow {
    pub id: i64,
    pub balance: String,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Row type for table `transactions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: String,
    pub member_id: String,
    pub tx_type: String,
    pub amount: String,
    pub status: String,
    pub created_by: Option<String>,
    pub balance_after: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Row type for table `loans`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LoanRow {
    pub id: i64,
    pub requested_by: String,
    pub borrower: String,
    pub amount: String,
    pub amount_approved: String,
    pub guarantor1: String,
    pub guarantor2: String,
    pub guarantor1_decision: Option<String>,
    pub guarantor2_decision: Option<String>,
    pub treasurer_decision: Option<String>,
    pub total_due: String,
    pub due_date: Option<NaiveDate>,
    pub amount_repaid: String,
    pub status: String,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub version: i64,
}

/// Row type for table `guarantor_actions`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct GuarantorActionRow {
    pub id: i64,
    pub loan_id: i64,
    pub guarantor: String,
    pub decision: String,
    pub decided_at: DateTime<Utc>,
}

/// Row type for table `loan_repayments`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RepaymentRow {
    pub id: i64,
    pub loan_id: i64,
    pub amount_paid: String,
    pub payment_date: DateTime<Utc>,
    pub installment_number: i64,
    pub method: String,
    pub balance_after_payment: String,
    pub penalty: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Row type for table `password_reset_otps`
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct OtpRow {
    pub member_id: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub failed_attempts: i64,
}

// === Conversion implementations ===

impl TryFrom<MemberRow> for Member {
    type Error = PersistenceError;

    fn try_from(row: MemberRow) -> PersistenceResult<Self> {
        Ok(Member {
            role: parse_enum("members.role", &row.role, Role::from_str)?,
            status: parse_enum("members.status", &row.status, MemberStatus::from_str)?,
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            phone_number: row.phone_number,
            email: row.email,
            date_of_birth: row.date_of_birth,
            created_at: row.created_at,
            approved_at: row.approved_at,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = PersistenceError;

    fn try_from(row: AccountRow) -> PersistenceResult<Self> {
        let balance = parse_decimal("accounts.balance", &row.balance)?;
        Account::restore(row.member_id, balance, row.updated_at, row.version)
            .map_err(|e| PersistenceError::InvalidDecimal(e.to_string()))
    }
}

impl TryFrom<EmergencyFundRow> for EmergencyFund {
    type Error = PersistenceError;

    fn try_from(row: EmergencyFundRow) -> PersistenceResult<Self> {
        let balance = parse_decimal("emergency_fund.balance", &row.balance)?;
        EmergencyFund::restore(row.id, balance, row.updated_at, row.version)
            .map_err(|e| PersistenceError::InvalidDecimal(e.to_string()))
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> PersistenceResult<Self> {
        Ok(Transaction {
            tx_type: parse_enum("transactions.tx_type", &row.tx_type, TransactionType::from_str)?,
            amount: parse_decimal("transactions.amount", &row.amount)?,
            status: parse_enum("transactions.status", &row.status, TransactionStatus::from_str)?,
            balance_after: parse_decimal("transactions.balance_after", &row.balance_after)?,
            source: parse_enum("transactions.source", &row.source, TransactionSource::from_str)?,
            id: row.id,
            member_id: row.member_id,
            created_by: row.created_by,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

impl TryFrom<LoanRow> for LoanRequest {
    type Error = PersistenceError;

    fn try_from(row: LoanRow) -> PersistenceResult<Self> {
        Ok(LoanRequest {
            amount: parse_decimal("loans.amount", &row.amount)?,
            amount_approved: parse_decimal("loans.amount_approved", &row.amount_approved)?,
            guarantor1_decision: parse_optional_enum(
                "loans.guarantor1_decision",
                row.guarantor1_decision.as_deref(),
                GuarantorDecision::from_str,
            )?,
            guarantor2_decision: parse_optional_enum(
                "loans.guarantor2_decision",
                row.guarantor2_decision.as_deref(),
                GuarantorDecision::from_str,
            )?,
            treasurer_decision: parse_optional_enum(
                "loans.treasurer_decision",
                row.treasurer_decision.as_deref(),
                TreasurerDecision::from_str,
            )?,
            total_due: parse_decimal("loans.total_due", &row.total_due)?,
            amount_repaid: parse_decimal("loans.amount_repaid", &row.amount_repaid)?,
            status: parse_enum("loans.status", &row.status, LoanStatus::from_str)?,
            id: row.id,
            requested_by: row.requested_by,
            borrower: row.borrower,
            guarantor1: row.guarantor1,
            guarantor2: row.guarantor2,
            due_date: row.due_date,
            purpose: row.purpose,
            created_at: row.created_at,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            version: row.version,
        })
    }
}

impl TryFrom<GuarantorActionRow> for GuarantorAction {
    type Error = PersistenceError;

    fn try_from(row: GuarantorActionRow) -> PersistenceResult<Self> {
        Ok(GuarantorAction {
            decision: parse_enum(
                "guarantor_actions.decision",
                &row.decision,
                GuarantorDecision::from_str,
            )?,
            id: row.id,
            loan_id: row.loan_id,
            guarantor: row.guarantor,
            decided_at: row.decided_at,
        })
    }
}

impl TryFrom<RepaymentRow> for LoanRepayment {
    type Error = PersistenceError;

    fn try_from(row: RepaymentRow) -> PersistenceResult<Self> {
        Ok(LoanRepayment {
            amount_paid: parse_decimal("loan_repayments.amount_paid", &row.amount_paid)?,
            method: parse_enum("loan_repayments.method", &row.method, RepaymentMethod::from_str)?,
            balance_after_payment: parse_decimal(
                "loan_repayments.balance_after_payment",
                &row.balance_after_payment,
            )?,
            penalty: parse_decimal("loan_repayments.penalty", &row.penalty)?,
            status: parse_enum("loan_repayments.status", &row.status, RepaymentStatus::from_str)?,
            id: row.id,
            loan_id: row.loan_id,
            payment_date: row.payment_date,
            installment_number: row.installment_number,
            notes: row.notes,
            created_by: row.created_by,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
        })
    }
}

impl From<OtpRow> for PasswordResetOtp {
    fn from(row: OtpRow) -> Self {
        PasswordResetOtp {
            member_id: row.member_id,
            code: row.code,
            created_at: row.created_at,
            failed_attempts: row.failed_attempts,
        }
    }
}
