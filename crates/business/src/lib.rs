//! # Sacco Business
//!
//! Workflow layer - membership, savings transactions, loans, repayments and
//! password reset. Every mutating operation runs in a single database
//! transaction and checks the caller's role first.

pub mod error;
pub mod loan;
pub mod membership;
pub mod password_reset;
pub mod repayment;
pub mod services;
pub mod transaction;

pub use error::{BusinessError, BusinessResult, ErrorKind};
pub use loan::LoanService;
pub use membership::MembershipService;
pub use password_reset::{IssuedOtp, PasswordResetService};
pub use repayment::{RepaymentApproval, RepaymentService};
pub use services::ServiceContext;
pub use transaction::TransactionService;
