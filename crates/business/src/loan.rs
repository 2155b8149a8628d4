//! Loan workflow
//!
//! ```text
//! create -> guarantor_decide (x2) -> treasurer_decide -> repayments
//! ```

use crate::error::BusinessResult;
use crate::services::ServiceContext;
use chrono::Utc;
use rust_decimal::Decimal;
use sacco_core::{
    assess, Actor, Capability, CoreError, Eligibility, GuarantorAction, GuarantorDecision,
    LoanRequest, LoanStatus, NewLoanRequest, TreasurerDecision,
};
use sacco_persistence::{AccountRepo, GuarantorActionRepo, LoanRepo, MemberRepo};
use tracing::{debug, info, warn};

/// Loan Service - requests, guarantor answers, treasurer decisions
pub struct LoanService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LoanService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Files a request for `borrower`. Borrowers may file their own.
    pub async fn create(&self, actor: &Actor, request: NewLoanRequest) -> BusinessResult<LoanRequest> {
        actor.require_self_or(&request.borrower, Capability::RecordLoan)?;

        let mut db = self.ctx.begin_write().await?;
        let borrower = MemberRepo::get_by_id(&mut db, &request.borrower).await?;
        let guarantor1 = MemberRepo::get_by_id(&mut db, &request.guarantor1).await?;
        let guarantor2 = MemberRepo::get_by_id(&mut db, &request.guarantor2).await?;

        let unapproved: Vec<&str> = [&borrower, &guarantor1, &guarantor2]
            .into_iter()
            .filter(|member| !member.is_active())
            .map(|member| member.id.as_str())
            .collect();
        if !unapproved.is_empty() {
            warn!(borrower = %request.borrower, ?unapproved, "Loan request names unapproved members");
            return Err(CoreError::validation(format!(
                "members not yet approved: {}",
                unapproved.join(", ")
            ))
            .into());
        }

        if let Err(e) = request.validate(guarantor1.role, guarantor2.role) {
            warn!(borrower = %request.borrower, error = %e, "Loan request refused");
            return Err(e.into());
        }

        let mut loan = LoanRequest::create(request, &actor.member_id, Utc::now());
        LoanRepo::insert(&mut db, &mut loan).await?;
        db.commit().await?;

        info!(
            loan_id = loan.id,
            borrower = %loan.borrower,
            amount = %loan.amount,
            "Loan requested"
        );
        Ok(loan)
    }

    /// The acting member answers as guarantor of `loan_id`
    pub async fn guarantor_decide(
        &self,
        actor: &Actor,
        loan_id: i64,
        decision: GuarantorDecision,
    ) -> BusinessResult<LoanRequest> {
        let now = Utc::now();

        let mut db = self.ctx.begin_write().await?;
        let mut loan = LoanRepo::get_by_id(&mut db, loan_id).await?;
        let slot = match loan.record_guarantor_decision(
            &actor.member_id,
            decision,
            self.ctx.config().guarantor_decline_policy,
        ) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(loan_id, guarantor = %actor.member_id, error = %e, "Guarantor decision refused");
                return Err(e.into());
            }
        };

        GuarantorActionRepo::upsert(&mut db, loan_id, &actor.member_id, decision, now).await?;
        LoanRepo::update(&mut db, &mut loan).await?;
        db.commit().await?;

        info!(
            loan_id,
            guarantor = %actor.member_id,
            slot = ?slot,
            decision = %decision,
            status = %loan.status,
            "Guarantor decision recorded"
        );
        Ok(loan)
    }

    /// Loans still waiting on the acting member as guarantor
    pub async fn pending_guarantor_requests(&self, actor: &Actor) -> BusinessResult<Vec<LoanRequest>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(LoanRepo::pending_for_guarantor(&mut conn, &actor.member_id).await?)
    }

    pub async fn guarantor_actions(&self, loan_id: i64) -> BusinessResult<Vec<GuarantorAction>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(GuarantorActionRepo::list_for_loan(&mut conn, loan_id).await?)
    }

    /// Approves (optionally for less than requested) or rejects
    pub async fn treasurer_decide(
        &self,
        actor: &Actor,
        loan_id: i64,
        decision: TreasurerDecision,
        approved_amount: Option<Decimal>,
    ) -> BusinessResult<LoanRequest> {
        actor.require(Capability::DecideLoan)?;

        let mut db = self.ctx.begin_write().await?;
        let mut loan = LoanRepo::get_by_id(&mut db, loan_id).await?;
        if let Err(e) = loan.treasurer_decide(
            decision,
            approved_amount,
            &actor.member_id,
            Utc::now(),
            self.ctx.config(),
        ) {
            warn!(loan_id, error = %e, "Treasurer decision refused");
            return Err(e.into());
        }

        LoanRepo::update(&mut db, &mut loan).await?;
        db.commit().await?;

        info!(
            loan_id,
            decision = %decision,
            amount_approved = %loan.amount_approved,
            total_due = %loan.total_due,
            decided_by = %actor.member_id,
            "Treasurer decision recorded"
        );
        Ok(loan)
    }

    /// Borrower or requester may withdraw; staff need RecordLoan
    pub async fn cancel(&self, actor: &Actor, loan_id: i64) -> BusinessResult<LoanRequest> {
        let mut db = self.ctx.begin_write().await?;
        let mut loan = LoanRepo::get_by_id(&mut db, loan_id).await?;

        if actor.member_id != loan.borrower && actor.member_id != loan.requested_by {
            actor.require(Capability::RecordLoan)?;
        }
        loan.cancel()?;

        LoanRepo::update(&mut db, &mut loan).await?;
        db.commit().await?;

        info!(loan_id, cancelled_by = %actor.member_id, "Loan cancelled");
        Ok(loan)
    }

    pub async fn get(&self, actor: &Actor, loan_id: i64) -> BusinessResult<LoanRequest> {
        let mut conn = self.ctx.pool().acquire().await?;
        let loan = LoanRepo::get_by_id(&mut conn, loan_id).await?;

        let involved = actor.member_id == loan.borrower
            || actor.member_id == loan.requested_by
            || loan.slot_of(&actor.member_id).is_some();
        if !involved {
            actor.require(Capability::ViewAllRecords)?;
        }
        Ok(loan)
    }

    pub async fn list_for_borrower(
        &self,
        actor: &Actor,
        borrower: &str,
    ) -> BusinessResult<Vec<LoanRequest>> {
        actor.require_self_or(borrower, Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(LoanRepo::list_for_borrower(&mut conn, borrower).await?)
    }

    pub async fn list_all(
        &self,
        actor: &Actor,
        status: Option<LoanStatus>,
    ) -> BusinessResult<Vec<LoanRequest>> {
        actor.require(Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        let loans = match status {
            Some(status) => LoanRepo::list_by_status(&mut conn, status).await?,
            None => LoanRepo::list_all(&mut conn).await?,
        };
        debug!(count = loans.len(), "Listed loans");
        Ok(loans)
    }

    /// How much `member_id` may borrow right now
    pub async fn eligibility(&self, actor: &Actor, member_id: &str) -> BusinessResult<Eligibility> {
        actor.require_self_or(member_id, Capability::ViewAllRecords)?;

        let mut conn = self.ctx.pool().acquire().await?;
        let member = MemberRepo::find_by_id(&mut conn, member_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Member", member_id))?;
        let account = AccountRepo::get(&mut conn, &member.id).await?;
        let loans = LoanRepo::list_for_borrower(&mut conn, &member.id).await?;

        let eligibility = assess(
            &member.id,
            account.balance(),
            self.ctx.config().loan_multiplier,
            &loans,
        )?;
        debug!(
            member_id,
            eligible_amount = %eligibility.eligible_amount,
            "Eligibility assessed"
        );
        Ok(eligibility)
    }
}
