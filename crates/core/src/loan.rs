//! # Loan Module
//!
//! Loan requests and their approval state machine:
//!
//! ```text
//! pending_guarantors -> pending_treasurer -> approved -> repayment_in_progress -> repaid
//!          |                    |
//!          +--> rejected / cancelled <--+
//! ```
//!
//! Guarantors confirm first, then the treasurer decides the approved amount.
//! After approval the status is derived from `amount_repaid` vs `total_due`.

use crate::config::{DeclinePolicy, SaccoConfig};
use crate::error::{ensure_positive, CoreError, CoreResult};
use crate::member::Role;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    // === Approval stages ===
    PendingGuarantors,
    PendingTreasurer,

    // === Repayment phase ===
    Approved,
    RepaymentInProgress,
    Repaid,

    // === Off-ramps ===
    Rejected,
    Cancelled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::PendingGuarantors => "pending_guarantors",
            LoanStatus::PendingTreasurer => "pending_treasurer",
            LoanStatus::Approved => "approved",
            LoanStatus::RepaymentInProgress => "repayment_in_progress",
            LoanStatus::Repaid => "repaid",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending_guarantors" => Some(LoanStatus::PendingGuarantors),
            "pending_treasurer" => Some(LoanStatus::PendingTreasurer),
            "approved" => Some(LoanStatus::Approved),
            "repayment_in_progress" => Some(LoanStatus::RepaymentInProgress),
            "repaid" => Some(LoanStatus::Repaid),
            "rejected" => Some(LoanStatus::Rejected),
            "cancelled" => Some(LoanStatus::Cancelled),
            _ => None,
        }
    }

    /// No transition leaves these states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Repaid | LoanStatus::Rejected | LoanStatus::Cancelled
        )
    }

    /// Status is derived from repayments once the loan is approved
    pub fn in_repayment_phase(&self) -> bool {
        matches!(
            self,
            LoanStatus::Approved | LoanStatus::RepaymentInProgress | LoanStatus::Repaid
        )
    }

    /// Counts against the borrower's eligibility
    pub fn is_outstanding(&self) -> bool {
        !self.is_terminal()
    }

    pub fn accepts_repayments(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::RepaymentInProgress)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A guarantor's answer. An unset slot is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuarantorDecision {
    Accepted,
    Declined,
}

impl GuarantorDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuarantorDecision::Accepted => "accepted",
            GuarantorDecision::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "accepted" | "accept" => Some(GuarantorDecision::Accepted),
            "declined" | "decline" => Some(GuarantorDecision::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for GuarantorDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreasurerDecision {
    Approved,
    Rejected,
}

impl TreasurerDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreasurerDecision::Approved => "approved",
            TreasurerDecision::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approved" | "approve" => Some(TreasurerDecision::Approved),
            "rejected" | "reject" => Some(TreasurerDecision::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TreasurerDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which of the two guarantor columns a member occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuarantorSlot {
    First,
    Second,
}

/// Loan application as submitted by a member or the secretary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLoanRequest {
    pub borrower: String,
    pub amount: Decimal,
    pub guarantor1: String,
    pub guarantor2: String,
    pub purpose: Option<String>,
}

impl NewLoanRequest {
    /// Checks the guarantor rules given each guarantor's current role.
    ///
    /// All violations are reported together.
    pub fn validate(&self, guarantor1_role: Role, guarantor2_role: Role) -> CoreResult<()> {
        let mut errors = Vec::new();

        if let Err(CoreError::Validation(message)) = ensure_positive(self.amount, "amount") {
            errors.push(message);
        }
        if self.guarantor1 == self.guarantor2 {
            errors.push("guarantor 1 and guarantor 2 must be different people".to_string());
        }
        if self.guarantor1 == self.borrower || self.guarantor2 == self.borrower {
            errors.push("borrower cannot be their own guarantor".to_string());
        }
        if guarantor1_role.is_restricted_guarantor() {
            errors.push(format!("guarantor 1 cannot be a {}", guarantor1_role));
        }
        if guarantor2_role.is_restricted_guarantor() {
            errors.push(format!("guarantor 2 cannot be a {}", guarantor2_role));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::validation(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    /// Assigned by storage, 0 until inserted
    pub id: i64,
    pub requested_by: String,
    pub borrower: String,
    pub amount: Decimal,
    pub amount_approved: Decimal,
    pub guarantor1: String,
    pub guarantor2: String,
    pub guarantor1_decision: Option<GuarantorDecision>,
    pub guarantor2_decision: Option<GuarantorDecision>,
    pub treasurer_decision: Option<TreasurerDecision>,
    /// Principal plus interest, set on approval
    pub total_due: Decimal,
    pub due_date: Option<NaiveDate>,
    pub amount_repaid: Decimal,
    pub status: LoanStatus,
    pub purpose: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    /// Optimistic lock counter, bumped by every persisted update
    pub version: i64,
}

impl LoanRequest {
    /// New request awaiting both guarantors. Guarantor roles must already
    /// have been checked with [`NewLoanRequest::validate`].
    pub fn create(request: NewLoanRequest, requested_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            requested_by: requested_by.to_string(),
            borrower: request.borrower,
            amount: request.amount,
            amount_approved: Decimal::ZERO,
            guarantor1: request.guarantor1,
            guarantor2: request.guarantor2,
            guarantor1_decision: None,
            guarantor2_decision: None,
            treasurer_decision: None,
            total_due: Decimal::ZERO,
            due_date: None,
            amount_repaid: Decimal::ZERO,
            status: LoanStatus::PendingGuarantors,
            purpose: request.purpose,
            created_at: now,
            approved_at: None,
            approved_by: None,
            version: 0,
        }
    }

    pub fn slot_of(&self, member_id: &str) -> Option<GuarantorSlot> {
        if self.guarantor1 == member_id {
            Some(GuarantorSlot::First)
        } else if self.guarantor2 == member_id {
            Some(GuarantorSlot::Second)
        } else {
            None
        }
    }

    pub fn decision_of(&self, slot: GuarantorSlot) -> Option<GuarantorDecision> {
        match slot {
            GuarantorSlot::First => self.guarantor1_decision,
            GuarantorSlot::Second => self.guarantor2_decision,
        }
    }

    fn invalid_state(&self, operation: &str) -> CoreError {
        CoreError::invalid_state("Loan", self.status.as_str(), operation)
    }

    /// Records a designated guarantor's answer and re-evaluates the status.
    ///
    /// Both slots accepted moves the loan to `pending_treasurer`. A decline
    /// rejects the loan only under [`DeclinePolicy::RejectLoan`].
    pub fn record_guarantor_decision(
        &mut self,
        guarantor: &str,
        decision: GuarantorDecision,
        policy: DeclinePolicy,
    ) -> CoreResult<GuarantorSlot> {
        let slot = self.slot_of(guarantor).ok_or_else(|| {
            CoreError::forbidden(format!(
                "{} is not a guarantor of loan {}",
                guarantor, self.id
            ))
        })?;
        if self.status != LoanStatus::PendingGuarantors {
            return Err(self.invalid_state("record guarantor decision for"));
        }

        match slot {
            GuarantorSlot::First => self.guarantor1_decision = Some(decision),
            GuarantorSlot::Second => self.guarantor2_decision = Some(decision),
        }

        let both_accepted = self.guarantor1_decision == Some(GuarantorDecision::Accepted)
            && self.guarantor2_decision == Some(GuarantorDecision::Accepted);
        if both_accepted {
            self.status = LoanStatus::PendingTreasurer;
        } else if decision == GuarantorDecision::Declined
            && policy == DeclinePolicy::RejectLoan
        {
            self.status = LoanStatus::Rejected;
        }

        Ok(slot)
    }

    /// Treasurer approval or rejection.
    ///
    /// On approval `approved_amount` defaults to the requested amount and
    /// may not exceed it. Nothing changes when an error is returned.
    pub fn treasurer_decide(
        &mut self,
        decision: TreasurerDecision,
        approved_amount: Option<Decimal>,
        decided_by: &str,
        now: DateTime<Utc>,
        config: &SaccoConfig,
    ) -> CoreResult<()> {
        if self.status != LoanStatus::PendingTreasurer {
            if self.treasurer_decision.is_some() {
                return Err(CoreError::already_processed("Loan", self.status.as_str()));
            }
            return Err(self.invalid_state("decide"));
        }

        match decision {
            TreasurerDecision::Approved => {
                let approved = approved_amount.unwrap_or(self.amount);
                ensure_positive(approved, "approved amount")?;
                if approved > self.amount {
                    return Err(CoreError::validation(format!(
                        "approved amount {} exceeds requested amount {}",
                        approved, self.amount
                    )));
                }

                let total_due = compute_total_due(approved, config.interest_rate_percent)?;
                self.amount_approved = approved;
                self.total_due = total_due;
                self.due_date = Some(now.date_naive() + config.loan_term());
                self.approved_at = Some(now);
                self.approved_by = Some(decided_by.to_string());
                self.status = LoanStatus::Approved;
            }
            TreasurerDecision::Rejected => {
                self.status = LoanStatus::Rejected;
            }
        }
        self.treasurer_decision = Some(decision);
        Ok(())
    }

    /// Withdraws the request before the treasurer has decided
    pub fn cancel(&mut self) -> CoreResult<()> {
        match self.status {
            LoanStatus::PendingGuarantors | LoanStatus::PendingTreasurer => {
                self.status = LoanStatus::Cancelled;
                Ok(())
            }
            _ => Err(self.invalid_state("cancel")),
        }
    }

    /// `total_due - amount_repaid`, never below zero
    pub fn outstanding(&self) -> Decimal {
        (self.total_due - self.amount_repaid).max(Decimal::ZERO)
    }

    pub fn accepts_repayments(&self) -> bool {
        self.status.accepts_repayments()
    }

    /// Adds an approved repayment and re-derives the status
    pub fn apply_repayment(&mut self, amount: Decimal) -> CoreResult<()> {
        ensure_positive(amount, "repayment amount")?;
        if !self.status.in_repayment_phase() {
            return Err(self.invalid_state("apply repayment to"));
        }
        self.amount_repaid = self
            .amount_repaid
            .checked_add(amount)
            .ok_or_else(|| CoreError::validation("repaid total overflow"))?;
        self.refresh_repayment_status();
        Ok(())
    }

    /// Replaces the repaid total, used after a repayment is removed
    pub fn reset_repaid(&mut self, amount_repaid: Decimal) {
        self.amount_repaid = amount_repaid.max(Decimal::ZERO);
        self.refresh_repayment_status();
    }

    pub fn refresh_repayment_status(&mut self) {
        self.status = derive_repayment_status(self.status, self.amount_repaid, self.total_due);
    }
}

impl fmt::Display for LoanRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loan #{} for {} - {} ({})",
            self.id, self.borrower, self.amount, self.status
        )
    }
}

/// `approved_amount * (1 + rate/100)`, rounded to cents.
///
/// Fails with `Validation` instead of overflowing.
pub fn compute_total_due(
    approved_amount: Decimal,
    interest_rate_percent: Decimal,
) -> CoreResult<Decimal> {
    let overflow = || {
        CoreError::validation(format!(
            "total due overflows for {} at {}%",
            approved_amount, interest_rate_percent
        ))
    };
    let interest = approved_amount
        .checked_mul(interest_rate_percent)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(overflow)?;
    approved_amount
        .checked_add(interest)
        .map(|total| total.round_dp(2))
        .ok_or_else(overflow)
}

/// Loan status as a function of repayments.
///
/// Only loans in the repayment phase are affected; any other status is
/// returned unchanged.
pub fn derive_repayment_status(
    current: LoanStatus,
    amount_repaid: Decimal,
    total_due: Decimal,
) -> LoanStatus {
    if !current.in_repayment_phase() {
        return current;
    }
    if amount_repaid <= Decimal::ZERO {
        LoanStatus::Approved
    } else if amount_repaid < total_due {
        LoanStatus::RepaymentInProgress
    } else {
        LoanStatus::Repaid
    }
}

/// One row per (loan, guarantor): the guarantor's latest answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuarantorAction {
    pub id: i64,
    pub loan_id: i64,
    pub guarantor: String,
    pub decision: GuarantorDecision,
    pub decided_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal) -> NewLoanRequest {
        NewLoanRequest {
            borrower: "B".to_string(),
            amount,
            guarantor1: "G1".to_string(),
            guarantor2: "G2".to_string(),
            purpose: Some("school fees".to_string()),
        }
    }

    fn pending_treasurer_loan(amount: Decimal) -> LoanRequest {
        let mut loan = LoanRequest::create(request(amount), "B", Utc::now());
        loan.record_guarantor_decision("G1", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap();
        loan.record_guarantor_decision("G2", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap();
        loan
    }

    fn approved_loan() -> LoanRequest {
        let mut loan = pending_treasurer_loan(dec!(10000));
        loan.treasurer_decide(
            TreasurerDecision::Approved,
            Some(dec!(8000)),
            "T",
            Utc::now(),
            &SaccoConfig::default(),
        )
        .unwrap();
        loan
    }

    #[test]
    fn test_validate_guarantor_rules() {
        assert!(request(dec!(100)).validate(Role::Member, Role::Admin).is_ok());

        let mut same = request(dec!(100));
        same.guarantor2 = "G1".to_string();
        assert!(same.validate(Role::Member, Role::Member).is_err());

        let mut self_guarantee = request(dec!(100));
        self_guarantee.guarantor1 = "B".to_string();
        assert!(self_guarantee.validate(Role::Member, Role::Member).is_err());

        let err = request(dec!(100))
            .validate(Role::Treasurer, Role::Secretary)
            .unwrap_err();
        assert!(err.to_string().contains("guarantor 1 cannot be a treasurer"));
        assert!(err.to_string().contains("guarantor 2 cannot be a secretary"));

        assert!(request(dec!(0)).validate(Role::Member, Role::Member).is_err());
    }

    #[test]
    fn test_status_str_roundtrip() {
        for status in [
            LoanStatus::PendingGuarantors,
            LoanStatus::PendingTreasurer,
            LoanStatus::Approved,
            LoanStatus::RepaymentInProgress,
            LoanStatus::Repaid,
            LoanStatus::Rejected,
            LoanStatus::Cancelled,
        ] {
            assert_eq!(LoanStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(LoanStatus::from_str("disbursed"), None);
    }

    #[test]
    fn test_guarantors_move_loan_to_treasurer() {
        let mut loan = LoanRequest::create(request(dec!(10000)), "B", Utc::now());
        assert_eq!(loan.status, LoanStatus::PendingGuarantors);

        let slot = loan
            .record_guarantor_decision("G2", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap();
        assert_eq!(slot, GuarantorSlot::Second);
        assert_eq!(loan.status, LoanStatus::PendingGuarantors);

        loan.record_guarantor_decision("G1", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap();
        assert_eq!(loan.status, LoanStatus::PendingTreasurer);
    }

    #[test]
    fn test_non_guarantor_forbidden() {
        let mut loan = LoanRequest::create(request(dec!(10000)), "B", Utc::now());
        let err = loan
            .record_guarantor_decision("X", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(loan.guarantor1_decision, None);
    }

    #[test]
    fn test_decline_leave_pending_allows_change_of_mind() {
        let mut loan = LoanRequest::create(request(dec!(10000)), "B", Utc::now());
        loan.record_guarantor_decision("G1", GuarantorDecision::Declined, DeclinePolicy::LeavePending)
            .unwrap();
        assert_eq!(loan.status, LoanStatus::PendingGuarantors);
        assert_eq!(loan.guarantor1_decision, Some(GuarantorDecision::Declined));

        loan.record_guarantor_decision("G1", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap();
        loan.record_guarantor_decision("G2", GuarantorDecision::Accepted, DeclinePolicy::LeavePending)
            .unwrap();
        assert_eq!(loan.status, LoanStatus::PendingTreasurer);
    }

    #[test]
    fn test_decline_reject_policy() {
        let mut loan = LoanRequest::create(request(dec!(10000)), "B", Utc::now());
        loan.record_guarantor_decision("G1", GuarantorDecision::Declined, DeclinePolicy::RejectLoan)
            .unwrap();
        assert_eq!(loan.status, LoanStatus::Rejected);

        let err = loan
            .record_guarantor_decision("G2", GuarantorDecision::Accepted, DeclinePolicy::RejectLoan)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn test_treasurer_approval_computes_total_due() {
        let loan = approved_loan();

        assert_eq!(loan.status, LoanStatus::Approved);
        assert_eq!(loan.amount_approved, dec!(8000));
        assert_eq!(loan.total_due, dec!(8800));
        assert_eq!(loan.approved_by.as_deref(), Some("T"));
        assert_eq!(
            loan.due_date,
            Some(Utc::now().date_naive() + chrono::Duration::days(365))
        );
    }

    #[test]
    fn test_treasurer_cannot_exceed_requested() {
        let mut loan = pending_treasurer_loan(dec!(1000));
        let err = loan
            .treasurer_decide(
                TreasurerDecision::Approved,
                Some(dec!(1000.01)),
                "T",
                Utc::now(),
                &SaccoConfig::default(),
            )
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(loan.amount_approved, dec!(0));
        assert_eq!(loan.due_date, None);
        assert_eq!(loan.status, LoanStatus::PendingTreasurer);
    }

    #[test]
    fn test_treasurer_decide_states() {
        let mut early = LoanRequest::create(request(dec!(1000)), "B", Utc::now());
        let err = early
            .treasurer_decide(TreasurerDecision::Approved, None, "T", Utc::now(), &SaccoConfig::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));

        let mut loan = approved_loan();
        let err = loan
            .treasurer_decide(TreasurerDecision::Rejected, None, "T", Utc::now(), &SaccoConfig::default())
            .unwrap_err();
        assert!(err.is_already_processed());
    }

    #[test]
    fn test_treasurer_reject() {
        let mut loan = pending_treasurer_loan(dec!(1000));
        loan.treasurer_decide(TreasurerDecision::Rejected, None, "T", Utc::now(), &SaccoConfig::default())
            .unwrap();
        assert_eq!(loan.status, LoanStatus::Rejected);
        assert_eq!(loan.total_due, dec!(0));
        assert!(loan.cancel().is_err());
    }

    #[test]
    fn test_cancel() {
        let mut loan = pending_treasurer_loan(dec!(1000));
        loan.cancel().unwrap();
        assert_eq!(loan.status, LoanStatus::Cancelled);
        assert!(loan.status.is_terminal());
    }

    #[test]
    fn test_compute_total_due_rounding() {
        assert_eq!(compute_total_due(dec!(8000), dec!(10)).unwrap(), dec!(8800));
        assert_eq!(compute_total_due(dec!(333.33), dec!(10)).unwrap(), dec!(366.66));
        assert_eq!(compute_total_due(dec!(1000), dec!(12.5)).unwrap(), dec!(1125));
    }

    #[test]
    fn test_compute_total_due_overflow_is_an_error() {
        let err = compute_total_due(Decimal::MAX, dec!(10)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = compute_total_due(dec!(70000000000000000000000000000), dec!(10)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(request(crate::error::MAX_AMOUNT)
            .validate(Role::Member, Role::Member)
            .is_ok());

        let err = request(dec!(70000000000000000000000000000))
            .validate(Role::Member, Role::Member)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.to_string().contains("exceeds the maximum"));

        assert!(request(dec!(100.005)).validate(Role::Member, Role::Member).is_err());
    }

    #[test]
    fn test_treasurer_refuses_oversized_loan() {
        let mut loan = pending_treasurer_loan(dec!(70000000000000000000000000000));
        let err = loan
            .treasurer_decide(TreasurerDecision::Approved, None, "T", Utc::now(), &SaccoConfig::default())
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(loan.status, LoanStatus::PendingTreasurer);
        assert_eq!(loan.total_due, dec!(0));
        assert_eq!(loan.treasurer_decision, None);
    }

    #[test]
    fn test_apply_repayment_overflow_is_an_error() {
        let mut loan = approved_loan();
        loan.amount_repaid = Decimal::MAX;
        loan.status = LoanStatus::Repaid;

        let err = loan.apply_repayment(dec!(1)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(loan.amount_repaid, Decimal::MAX);
    }

    #[test]
    fn test_derive_repayment_status() {
        use LoanStatus::*;
        assert_eq!(derive_repayment_status(Approved, dec!(0), dec!(100)), Approved);
        assert_eq!(derive_repayment_status(Approved, dec!(1), dec!(100)), RepaymentInProgress);
        assert_eq!(derive_repayment_status(RepaymentInProgress, dec!(100), dec!(100)), Repaid);
        assert_eq!(derive_repayment_status(Repaid, dec!(50), dec!(100)), RepaymentInProgress);
        assert_eq!(derive_repayment_status(PendingTreasurer, dec!(50), dec!(100)), PendingTreasurer);

        let once = derive_repayment_status(Approved, dec!(40), dec!(100));
        assert_eq!(derive_repayment_status(once, dec!(40), dec!(100)), once);
    }

    #[test]
    fn test_apply_repayment_to_payoff() {
        let mut loan = approved_loan();

        loan.apply_repayment(dec!(800)).unwrap();
        assert_eq!(loan.status, LoanStatus::RepaymentInProgress);
        assert_eq!(loan.outstanding(), dec!(8000));

        loan.apply_repayment(dec!(8000)).unwrap();
        assert_eq!(loan.status, LoanStatus::Repaid);
        assert_eq!(loan.outstanding(), dec!(0));

        loan.reset_repaid(dec!(0));
        assert_eq!(loan.status, LoanStatus::Approved);
    }

    #[test]
    fn test_apply_repayment_before_approval() {
        let mut loan = pending_treasurer_loan(dec!(1000));
        assert!(loan.apply_repayment(dec!(10)).is_err());
        assert_eq!(loan.amount_repaid, dec!(0));
    }
}
