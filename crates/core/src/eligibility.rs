//! Borrowing limit calculation

use crate::error::{CoreError, CoreResult};
use crate::loan::{LoanRequest, LoanStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The loan blocking new borrowing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingLoan {
    pub loan_id: i64,
    /// `total_due - amount_repaid`, zero until the treasurer approves
    pub amount: Decimal,
    pub requested: Decimal,
    pub status: LoanStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub member_id: String,
    pub balance: Decimal,
    pub multiplier: Decimal,
    pub eligible_amount: Decimal,
    pub outstanding: Option<OutstandingLoan>,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        self.eligible_amount > Decimal::ZERO
    }
}

/// `balance x multiplier`, or zero while any loan is still open.
///
/// Repaid, rejected and cancelled loans do not count. With several open
/// loans the most recent one is reported.
pub fn assess(
    member_id: &str,
    balance: Decimal,
    multiplier: Decimal,
    loans: &[LoanRequest],
) -> CoreResult<Eligibility> {
    let open = loans
        .iter()
        .filter(|loan| loan.borrower == member_id && loan.status.is_outstanding())
        .max_by_key(|loan| (loan.created_at, loan.id));

    match open {
        Some(loan) => Ok(Eligibility {
            member_id: member_id.to_string(),
            balance,
            multiplier,
            eligible_amount: Decimal::ZERO,
            outstanding: Some(OutstandingLoan {
                loan_id: loan.id,
                amount: loan.outstanding(),
                requested: loan.amount,
                status: loan.status,
            }),
        }),
        None => {
            let eligible_amount = balance.checked_mul(multiplier).ok_or_else(|| {
                CoreError::validation(format!(
                    "eligible amount overflows for balance {} x {}",
                    balance, multiplier
                ))
            })?;
            Ok(Eligibility {
                member_id: member_id.to_string(),
                balance,
                multiplier,
                eligible_amount,
                outstanding: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::NewLoanRequest;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn loan(id: i64, status: LoanStatus) -> LoanRequest {
        let mut loan = LoanRequest::create(
            NewLoanRequest {
                borrower: "B".to_string(),
                amount: dec!(5000),
                guarantor1: "G1".to_string(),
                guarantor2: "G2".to_string(),
                purpose: None,
            },
            "B",
            Utc::now(),
        );
        loan.id = id;
        loan.status = status;
        loan
    }

    #[test]
    fn test_no_loans() {
        let result = assess("B", dec!(2000), dec!(3), &[]).unwrap();
        assert_eq!(result.eligible_amount, dec!(6000));
        assert!(result.outstanding.is_none());
        assert!(result.is_eligible());
    }

    #[test]
    fn test_closed_loans_do_not_block() {
        let loans = vec![
            loan(1, LoanStatus::Repaid),
            loan(2, LoanStatus::Rejected),
            loan(3, LoanStatus::Cancelled),
        ];
        let result = assess("B", dec!(100), dec!(3), &loans).unwrap();
        assert_eq!(result.eligible_amount, dec!(300));
    }

    #[test]
    fn test_open_loan_blocks_and_surfaces_balance() {
        let mut active = loan(4, LoanStatus::RepaymentInProgress);
        active.total_due = dec!(5500);
        active.amount_repaid = dec!(1500);

        let result = assess("B", dec!(2000), dec!(3), &[loan(1, LoanStatus::Repaid), active]).unwrap();

        assert_eq!(result.eligible_amount, dec!(0));
        assert!(!result.is_eligible());
        let outstanding = result.outstanding.unwrap();
        assert_eq!(outstanding.loan_id, 4);
        assert_eq!(outstanding.amount, dec!(4000));
    }

    #[test]
    fn test_pending_loan_blocks_with_nothing_owed() {
        let result =
            assess("B", dec!(2000), dec!(3), &[loan(9, LoanStatus::PendingGuarantors)]).unwrap();
        assert_eq!(result.eligible_amount, dec!(0));
        let outstanding = result.outstanding.unwrap();
        assert_eq!(outstanding.amount, dec!(0));
        assert_eq!(outstanding.requested, dec!(5000));
        assert_eq!(outstanding.status, LoanStatus::PendingGuarantors);
    }

    #[test]
    fn test_eligible_amount_overflow_is_an_error() {
        let err = assess("B", dec!(30000000000000000000000000000), dec!(3), &[]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let result = assess("B", crate::error::MAX_AMOUNT, dec!(3), &[]).unwrap();
        assert_eq!(result.eligible_amount, dec!(29999999999.97));
    }

    #[test]
    fn test_other_borrowers_ignored() {
        let mut other = loan(5, LoanStatus::Approved);
        other.borrower = "C".to_string();
        let result = assess("B", dec!(10), dec!(3), &[other]).unwrap();
        assert_eq!(result.eligible_amount, dec!(30));
    }
}
