//! Transaction workflow - deposits, withdrawals, emergency contributions
//!
//! Approval reads the owner's account (and the emergency fund when needed),
//! applies the ledger effect, and writes everything back in one database
//! transaction. Balance rows are version-checked and the transaction row is
//! only finalized while still `pending`, so a second approval can never
//! apply twice.

use crate::error::BusinessResult;
use crate::services::ServiceContext;
use chrono::Utc;
use sacco_core::{
    Account, Actor, Capability, CoreError, EmergencyFund, NewTransaction, Transaction,
    TransactionStatus, TransactionType,
};
use sacco_persistence::{AccountRepo, EmergencyFundRepo, MemberRepo, TransactionRepo};
use tracing::{debug, info, warn};

/// Transaction Service - create, approve, reject, list
pub struct TransactionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransactionService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Records a pending request. Members may file their own.
    pub async fn create(
        &self,
        actor: &Actor,
        new_tx: NewTransaction,
    ) -> BusinessResult<Transaction> {
        actor.require_self_or(&new_tx.member_id, Capability::RecordTransaction)?;
        let transaction = Transaction::create(new_tx, Some(&actor.member_id), Utc::now())?;

        let mut db = self.ctx.begin_write().await?;
        let owner = MemberRepo::get_by_id(&mut db, &transaction.member_id).await?;
        if !owner.is_active() {
            return Err(CoreError::validation(format!(
                "member {} has not been approved yet",
                owner.id
            ))
            .into());
        }
        TransactionRepo::insert(&mut db, &transaction).await?;
        db.commit().await?;

        info!(
            tx_id = %transaction.id,
            member_id = %transaction.member_id,
            tx_type = %transaction.tx_type,
            amount = %transaction.amount,
            "Transaction recorded"
        );
        Ok(transaction)
    }

    pub async fn approve(&self, actor: &Actor, tx_id: &str) -> BusinessResult<Transaction> {
        actor.require(Capability::ApproveTransaction)?;
        let now = Utc::now();

        let mut db = self.ctx.begin_write().await?;
        let mut transaction = TransactionRepo::get_by_id(&mut db, tx_id).await?;
        let mut account = AccountRepo::get(&mut db, &transaction.member_id).await?;
        let mut fund = if transaction.requires_fund() {
            Some(EmergencyFundRepo::get(&mut db).await?)
        } else {
            None
        };

        if let Err(e) = transaction.approve(&mut account, fund.as_mut(), now) {
            warn!(tx_id, error = %e, "Transaction approval refused");
            return Err(e.into());
        }

        match transaction.tx_type {
            TransactionType::Deposit | TransactionType::Withdrawal => {
                AccountRepo::save_balance(&mut db, &mut account).await?;
            }
            TransactionType::Emergency => {}
        }
        if let Some(fund) = fund.as_mut() {
            EmergencyFundRepo::save_balance(&mut db, fund).await?;
        }
        if !TransactionRepo::finalize(&mut db, &transaction).await? {
            return Err(
                CoreError::already_processed("Transaction", TransactionStatus::Approved.as_str())
                    .into(),
            );
        }
        db.commit().await?;

        info!(
            tx_id,
            tx_type = %transaction.tx_type,
            amount = %transaction.amount,
            balance_after = %transaction.balance_after,
            approved_by = %actor.member_id,
            "Transaction approved"
        );
        Ok(transaction)
    }

    pub async fn reject(&self, actor: &Actor, tx_id: &str) -> BusinessResult<Transaction> {
        actor.require(Capability::ApproveTransaction)?;

        let mut db = self.ctx.begin_write().await?;
        let mut transaction = TransactionRepo::get_by_id(&mut db, tx_id).await?;
        transaction.reject(Utc::now())?;

        if !TransactionRepo::finalize(&mut db, &transaction).await? {
            return Err(
                CoreError::already_processed("Transaction", TransactionStatus::Rejected.as_str())
                    .into(),
            );
        }
        db.commit().await?;

        info!(tx_id, rejected_by = %actor.member_id, "Transaction rejected");
        Ok(transaction)
    }

    /// Newest first
    pub async fn list_for_member(
        &self,
        actor: &Actor,
        member_id: &str,
    ) -> BusinessResult<Vec<Transaction>> {
        actor.require_self_or(member_id, Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        let transactions = TransactionRepo::list_for_member(&mut conn, member_id).await?;
        debug!(member_id, count = transactions.len(), "Listed member transactions");
        Ok(transactions)
    }

    pub async fn list_by_status(
        &self,
        actor: &Actor,
        status: TransactionStatus,
    ) -> BusinessResult<Vec<Transaction>> {
        actor.require(Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(TransactionRepo::list_by_status(&mut conn, status).await?)
    }

    pub async fn balance(&self, actor: &Actor, member_id: &str) -> BusinessResult<Account> {
        actor.require_self_or(member_id, Capability::ViewAllRecords)?;
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(AccountRepo::get(&mut conn, member_id).await?)
    }

    pub async fn emergency_fund(&self) -> BusinessResult<EmergencyFund> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(EmergencyFundRepo::get(&mut conn).await?)
    }
}
