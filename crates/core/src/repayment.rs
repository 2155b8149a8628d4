//! # Repayment Module
//!
//! Installments recorded against an approved loan. A repayment only counts
//! towards `amount_repaid` once the treasurer approves it. Rejecting deletes
//! the repayment, pending or approved, and the loan total is recomputed from
//! the approved ones that remain.

use crate::error::{ensure_positive, CoreError, CoreResult};
use crate::loan::LoanRequest;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl RepaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentStatus::Pending => "pending",
            RepaymentStatus::Approved => "approved",
            RepaymentStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(RepaymentStatus::Pending),
            "approved" => Some(RepaymentStatus::Approved),
            "rejected" => Some(RepaymentStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for RepaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentMethod {
    #[default]
    Cash,
    BankTransfer,
    Mpesa,
}

impl RepaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepaymentMethod::Cash => "cash",
            RepaymentMethod::BankTransfer => "bank_transfer",
            RepaymentMethod::Mpesa => "mpesa",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" => Some(RepaymentMethod::Cash),
            "bank_transfer" => Some(RepaymentMethod::BankTransfer),
            "mpesa" => Some(RepaymentMethod::Mpesa),
            _ => None,
        }
    }
}

impl fmt::Display for RepaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installment as entered by the secretary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRepayment {
    pub loan_id: i64,
    pub amount_paid: Decimal,
    #[serde(default)]
    pub method: RepaymentMethod,
    #[serde(default)]
    pub penalty: Decimal,
    pub notes: Option<String>,
}

impl NewRepayment {
    pub fn validate(&self, loan: &LoanRequest) -> CoreResult<()> {
        ensure_positive(self.amount_paid, "amount paid")?;
        if self.penalty < Decimal::ZERO {
            return Err(CoreError::validation(format!(
                "penalty cannot be negative: {}",
                self.penalty
            )));
        }
        if !loan.accepts_repayments() {
            return Err(CoreError::invalid_state(
                "Loan",
                loan.status.as_str(),
                "record repayment for",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRepayment {
    pub id: i64,
    pub loan_id: i64,
    pub amount_paid: Decimal,
    pub payment_date: DateTime<Utc>,
    /// 1-based position among the loan's repayments
    pub installment_number: i64,
    pub method: RepaymentMethod,
    /// Loan outstanding right after this repayment was approved
    pub balance_after_payment: Decimal,
    pub penalty: Decimal,
    pub notes: Option<String>,
    pub status: RepaymentStatus,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl LoanRepayment {
    /// Validates against the parent loan and creates a pending repayment.
    ///
    /// `last_installment` is the highest installment number already used on
    /// the loan; numbers are never reused after a repayment is removed.
    pub fn record(
        new_repayment: NewRepayment,
        loan: &LoanRequest,
        last_installment: i64,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        new_repayment.validate(loan)?;

        Ok(Self {
            id: 0,
            loan_id: loan.id,
            amount_paid: new_repayment.amount_paid,
            payment_date: now,
            installment_number: last_installment + 1,
            method: new_repayment.method,
            balance_after_payment: Decimal::ZERO,
            penalty: new_repayment.penalty,
            notes: new_repayment.notes,
            status: RepaymentStatus::Pending,
            created_by: Some(created_by.to_string()),
            approved_by: None,
            approved_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == RepaymentStatus::Pending
    }

    /// Credits the loan and marks this repayment approved
    pub fn approve(
        &mut self,
        loan: &mut LoanRequest,
        approver: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        if !self.is_pending() {
            return Err(CoreError::already_processed(
                "Repayment",
                self.status.as_str(),
            ));
        }
        if loan.id != self.loan_id {
            return Err(CoreError::validation(format!(
                "repayment {} belongs to loan {}, not {}",
                self.id, self.loan_id, loan.id
            )));
        }

        loan.apply_repayment(self.amount_paid)?;

        self.balance_after_payment = loan.outstanding();
        self.status = RepaymentStatus::Approved;
        self.approved_by = Some(approver.to_string());
        self.approved_at = Some(now);
        Ok(())
    }

    /// Whether removing this repayment lowers the loan's repaid total
    pub fn counts_towards_loan(&self) -> bool {
        self.status == RepaymentStatus::Approved
    }
}

impl fmt::Display for LoanRepayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loan #{} Repayment {} ({})",
            self.loan_id, self.amount_paid, self.status
        )
    }
}
