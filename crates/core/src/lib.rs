//! # Sacco Core
//!
//! Domain types and state machines for a savings and credit cooperative.
//! No I/O here; storage lives in `sacco-persistence`, workflows in
//! `sacco-business`.
//!
//! ## Lifecycles
//!
//! ```text
//! Transaction:  pending -> approved | rejected
//! Loan:         pending_guarantors -> pending_treasurer -> approved
//!                 -> repayment_in_progress -> repaid
//!               (rejected / cancelled before approval)
//! Repayment:    pending -> approved | deleted on rejection
//! ```

pub mod config;
pub mod eligibility;
pub mod error;
pub mod ledger;
pub mod loan;
pub mod member;
pub mod otp;
pub mod repayment;
pub mod transaction;

pub use config::{DeclinePolicy, SaccoConfig};
pub use eligibility::{assess, Eligibility, OutstandingLoan};
pub use error::{ensure_positive, CoreError, CoreResult, MAX_AMOUNT};
pub use ledger::{Account, Balance, EmergencyFund, EMERGENCY_FUND_ID};
pub use loan::{
    compute_total_due, derive_repayment_status, GuarantorAction, GuarantorDecision,
    GuarantorSlot, LoanRequest, LoanStatus, NewLoanRequest, TreasurerDecision,
};
pub use member::{Actor, Capability, Member, MemberStatus, NewMember, Role};
pub use otp::PasswordResetOtp;
pub use repayment::{LoanRepayment, NewRepayment, RepaymentMethod, RepaymentStatus};
pub use transaction::{
    NewTransaction, Transaction, TransactionSource, TransactionStatus, TransactionType,
};
