//! Repayment workflow
//!
//! The secretary records an installment, the treasurer approves it and only
//! then does the loan's repaid total move. Rejection removes the repayment
//! and rebuilds the loan total from the approved repayments that remain.

use crate::error::BusinessResult;
use crate::services::ServiceContext;
use chrono::Utc;
use sacco_core::{
    Actor, Capability, CoreError, LoanRepayment, LoanRequest, NewRepayment, RepaymentStatus,
};
use sacco_persistence::{LoanRepo, RepaymentRepo};
use serde::Serialize;
use tracing::{info, warn};

/// Approved repayment together with the loan it was applied to
#[derive(Debug, Clone, Serialize)]
pub struct RepaymentApproval {
    pub repayment: LoanRepayment,
    pub loan: LoanRequest,
}

/// Repayment Service - record, approve, reject, list
pub struct RepaymentService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> RepaymentService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn record(
        &self,
        actor: &Actor,
        new_repayment: NewRepayment,
    ) -> BusinessResult<LoanRepayment> {
        actor.require(Capability::RecordRepayment)?;
        let loan_id = new_repayment.loan_id;

        let mut db = self.ctx.begin_write().await?;
        let loan = LoanRepo::get_by_id(&mut db, loan_id).await?;
        let last = RepaymentRepo::last_installment(&mut db, loan_id).await?;

        let mut repayment =
            match LoanRepayment::record(new_repayment, &loan, last, &actor.member_id, Utc::now()) {
                Ok(r) => r,
                Err(e) => {
                    warn!(loan_id, error = %e, "Repayment refused");
                    return Err(e.into());
                }
            };
        RepaymentRepo::insert(&mut db, &mut repayment).await?;
        db.commit().await?;

        info!(
            repayment_id = repayment.id,
            loan_id,
            amount = %repayment.amount_paid,
            installment = repayment.installment_number,
            "Repayment recorded"
        );
        Ok(repayment)
    }

    pub async fn approve(&self, actor: &Actor, repayment_id: i64) -> BusinessResult<RepaymentApproval> {
        actor.require(Capability::ApproveRepayment)?;

        let mut db = self.ctx.begin_write().await?;
        let mut repayment = RepaymentRepo::get_by_id(&mut db, repayment_id).await?;
        let mut loan = LoanRepo::get_by_id(&mut db, repayment.loan_id).await?;

        if let Err(e) = repayment.approve(&mut loan, &actor.member_id, Utc::now()) {
            warn!(repayment_id, error = %e, "Repayment approval refused");
            return Err(e.into());
        }

        if !RepaymentRepo::approve(&mut db, &repayment).await? {
            return Err(
                CoreError::already_processed("Repayment", RepaymentStatus::Approved.as_str())
                    .into(),
            );
        }
        LoanRepo::update(&mut db, &mut loan).await?;
        db.commit().await?;

        info!(
            repayment_id,
            loan_id = loan.id,
            amount_repaid = %loan.amount_repaid,
            loan_status = %loan.status,
            approved_by = %actor.member_id,
            "Repayment approved"
        );
        Ok(RepaymentApproval { repayment, loan })
    }

    /// Deletes the repayment, pending or approved, and returns the loan with
    /// its repaid total recomputed
    pub async fn reject(&self, actor: &Actor, repayment_id: i64) -> BusinessResult<LoanRequest> {
        actor.require(Capability::ApproveRepayment)?;

        let mut db = self.ctx.begin_write().await?;
        let repayment = RepaymentRepo::get_by_id(&mut db, repayment_id).await?;
        let mut loan = LoanRepo::get_by_id(&mut db, repayment.loan_id).await?;

        if !RepaymentRepo::delete(&mut db, repayment_id).await? {
            return Err(CoreError::not_found("Repayment", repayment_id).into());
        }

        if repayment.counts_towards_loan() {
            let repaid = RepaymentRepo::sum_approved(&mut db, loan.id).await?;
            loan.reset_repaid(repaid);
            LoanRepo::update(&mut db, &mut loan).await?;
        }
        db.commit().await?;

        info!(
            repayment_id,
            loan_id = loan.id,
            was_approved = repayment.counts_towards_loan(),
            amount_repaid = %loan.amount_repaid,
            loan_status = %loan.status,
            rejected_by = %actor.member_id,
            "Repayment rejected"
        );
        Ok(loan)
    }

    pub async fn list_for_loan(&self, actor: &Actor, loan_id: i64) -> BusinessResult<Vec<LoanRepayment>> {
        let mut conn = self.ctx.pool().acquire().await?;
        let loan = LoanRepo::get_by_id(&mut conn, loan_id).await?;
        actor.require_self_or(&loan.borrower, Capability::ViewAllRecords)?;
        Ok(RepaymentRepo::list_for_loan(&mut conn, loan_id).await?)
    }

    pub async fn list_for_borrower(
        &self,
        actor: &Actor,
        borrower: &str,
    ) -> BusinessResult<Vec<LoanRepayment>> {
        actor.require_self_or(borrower, Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(RepaymentRepo::list_for_borrower(&mut conn, borrower).await?)
    }

    pub async fn list_all(&self, actor: &Actor) -> BusinessResult<Vec<LoanRepayment>> {
        actor.require(Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(RepaymentRepo::list_all(&mut conn).await?)
    }
}
