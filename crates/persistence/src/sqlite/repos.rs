//! Repository implementations for SQLite
//!
//! Every function takes a `&mut SqliteConnection`, so callers can pass either
//! a pooled connection or an open transaction. Balance and loan writes are
//! version-checked; status transitions are guarded by the expected status.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sacco_core::{
    Account, EmergencyFund, GuarantorAction, GuarantorDecision, LoanRepayment, LoanRequest,
    LoanStatus, Member, MemberStatus, PasswordResetOtp, RepaymentStatus, Role, Transaction,
    TransactionStatus, EMERGENCY_FUND_ID,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

/// How long a writer waits for another connection's write lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn collect<R, T>(rows: Vec<R>) -> PersistenceResult<Vec<T>>
where
    T: TryFrom<R, Error = PersistenceError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Member Repository
// ============================================================================

/// Repository for the members table
pub struct MemberRepo;

impl MemberRepo {
    pub async fn insert(conn: &mut SqliteConnection, member: &Member) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO members (id, first_name, last_name, phone_number, email, date_of_birth,
                                 role, status, created_at, approved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&member.id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.phone_number)
        .bind(&member.email)
        .bind(member.date_of_birth)
        .bind(member.role.as_str())
        .bind(member.status.as_str())
        .bind(member.created_at)
        .bind(member.approved_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> PersistenceResult<Option<Member>> {
        sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .map(Member::try_from)
            .transpose()
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Member> {
        Self::find_by_id(conn, id)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Member", id))
    }

    pub async fn find_by_phone(
        conn: &mut SqliteConnection,
        phone_number: &str,
    ) -> PersistenceResult<Option<Member>> {
        sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE phone_number = ?")
            .bind(phone_number)
            .fetch_optional(&mut *conn)
            .await?
            .map(Member::try_from)
            .transpose()
    }

    pub async fn list_by_status(
        conn: &mut SqliteConnection,
        status: MemberStatus,
    ) -> PersistenceResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT * FROM members WHERE status = ? ORDER BY created_at",
        )
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    /// Activates a pending member. Returns false if it was no longer pending.
    pub async fn approve(
        conn: &mut SqliteConnection,
        id: &str,
        approved_at: DateTime<Utc>,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            "UPDATE members SET status = 'active', approved_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(approved_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_role(
        conn: &mut SqliteConnection,
        id: &str,
        role: Role,
    ) -> PersistenceResult<()> {
        let result = sqlx::query("UPDATE members SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::not_found("Member", id));
        }
        Ok(())
    }

    /// Deletes a pending member. Returns false if it was no longer pending.
    pub async fn delete_pending(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<bool> {
        let result = sqlx::query("DELETE FROM members WHERE id = ? AND status = 'pending'")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }

    pub async fn count_with_role(conn: &mut SqliteConnection, role: Role) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM members WHERE role = ?")
            .bind(role.as_str())
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Account Repository
// ============================================================================

/// Repository for the accounts table
pub struct AccountRepo;

impl AccountRepo {
    pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> PersistenceResult<()> {
        sqlx::query(
            "INSERT INTO accounts (member_id, balance, updated_at, version) VALUES (?, ?, ?, ?)",
        )
        .bind(&account.member_id)
        .bind(account.balance().to_string())
        .bind(account.updated_at)
        .bind(account.version)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, member_id: &str) -> PersistenceResult<Account> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE member_id = ?")
            .bind(member_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Account", member_id))?
            .try_into()
    }

    /// Writes the balance if nobody else has since the account was read.
    ///
    /// Bumps `account.version` on success.
    pub async fn save_balance(
        conn: &mut SqliteConnection,
        account: &mut Account,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET balance = ?, updated_at = ?, version = version + 1
            WHERE member_id = ? AND version = ?
            "#,
        )
        .bind(account.balance().to_string())
        .bind(account.updated_at)
        .bind(&account.member_id)
        .bind(account.version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::stale("Account", &account.member_id));
        }
        account.version += 1;
        Ok(())
    }

    pub async fn total_savings(conn: &mut SqliteConnection) -> PersistenceResult<Decimal> {
        let balances: Vec<(String,)> = sqlx::query_as("SELECT balance FROM accounts")
            .fetch_all(&mut *conn)
            .await?;
        balances
            .iter()
            .map(|(b,)| parse_decimal("accounts.balance", b))
            .sum()
    }
}

// ============================================================================
// Emergency Fund Repository
// ============================================================================

/// Repository for the emergency_fund singleton
pub struct EmergencyFundRepo;

impl EmergencyFundRepo {
    /// The fund row is seeded by the initial migration
    pub async fn get(conn: &mut SqliteConnection) -> PersistenceResult<EmergencyFund> {
        sqlx::query_as::<_, EmergencyFundRow>("SELECT * FROM emergency_fund WHERE id = ?")
            .bind(EMERGENCY_FUND_ID)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("EmergencyFund", EMERGENCY_FUND_ID))?
            .try_into()
    }

    pub async fn save_balance(
        conn: &mut SqliteConnection,
        fund: &mut EmergencyFund,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE emergency_fund SET balance = ?, updated_at = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(fund.balance().to_string())
        .bind(fund.updated_at)
        .bind(fund.id)
        .bind(fund.version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::stale("EmergencyFund", fund.id));
        }
        fund.version += 1;
        Ok(())
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository for the transactions table
pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn insert(conn: &mut SqliteConnection, tx: &Transaction) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, member_id, tx_type, amount, status, created_by,
                                      balance_after, source, created_at, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.member_id)
        .bind(tx.tx_type.as_str())
        .bind(tx.amount.to_string())
        .bind(tx.status.as_str())
        .bind(&tx.created_by)
        .bind(tx.balance_after.to_string())
        .bind(tx.source.as_str())
        .bind(tx.created_at)
        .bind(tx.decided_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> PersistenceResult<Transaction> {
        sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Transaction", id))?
            .try_into()
    }

    /// Newest first
    pub async fn list_for_member(
        conn: &mut SqliteConnection,
        member_id: &str,
    ) -> PersistenceResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE member_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(member_id)
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    pub async fn list_by_status(
        conn: &mut SqliteConnection,
        status: TransactionStatus,
    ) -> PersistenceResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM transactions WHERE status = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    /// Persists an approval or rejection. Returns false if the row was no
    /// longer pending.
    pub async fn finalize(conn: &mut SqliteConnection, tx: &Transaction) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET status = ?, balance_after = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(tx.status.as_str())
        .bind(tx.balance_after.to_string())
        .bind(tx.decided_at)
        .bind(&tx.id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM transactions")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Loan Repository
// ============================================================================

/// Repository for the loans table
pub struct LoanRepo;

impl LoanRepo {
    /// Inserts and assigns `loan.id`
    pub async fn insert(conn: &mut SqliteConnection, loan: &mut LoanRequest) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO loans (requested_by, borrower, amount, amount_approved, guarantor1,
                               guarantor2, guarantor1_decision, guarantor2_decision,
                               treasurer_decision, total_due, due_date, amount_repaid, status,
                               purpose, created_at, approved_at, approved_by, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&loan.requested_by)
        .bind(&loan.borrower)
        .bind(loan.amount.to_string())
        .bind(loan.amount_approved.to_string())
        .bind(&loan.guarantor1)
        .bind(&loan.guarantor2)
        .bind(loan.guarantor1_decision.map(|d| d.as_str()))
        .bind(loan.guarantor2_decision.map(|d| d.as_str()))
        .bind(loan.treasurer_decision.map(|d| d.as_str()))
        .bind(loan.total_due.to_string())
        .bind(loan.due_date)
        .bind(loan.amount_repaid.to_string())
        .bind(loan.status.as_str())
        .bind(&loan.purpose)
        .bind(loan.created_at)
        .bind(loan.approved_at)
        .bind(&loan.approved_by)
        .bind(loan.version)
        .execute(&mut *conn)
        .await?;

        loan.id = result.last_insert_rowid();
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<LoanRequest> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Loan", id))?
            .try_into()
    }

    /// Writes every mutable column if the loan is unchanged since read.
    ///
    /// Bumps `loan.version` on success.
    pub async fn update(conn: &mut SqliteConnection, loan: &mut LoanRequest) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET
                amount_approved = ?, guarantor1_decision = ?, guarantor2_decision = ?,
                treasurer_decision = ?, total_due = ?, due_date = ?, amount_repaid = ?,
                status = ?, approved_at = ?, approved_by = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(loan.amount_approved.to_string())
        .bind(loan.guarantor1_decision.map(|d| d.as_str()))
        .bind(loan.guarantor2_decision.map(|d| d.as_str()))
        .bind(loan.treasurer_decision.map(|d| d.as_str()))
        .bind(loan.total_due.to_string())
        .bind(loan.due_date)
        .bind(loan.amount_repaid.to_string())
        .bind(loan.status.as_str())
        .bind(loan.approved_at)
        .bind(&loan.approved_by)
        .bind(loan.id)
        .bind(loan.version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::stale("Loan", loan.id));
        }
        loan.version += 1;
        Ok(())
    }

    pub async fn list_for_borrower(
        conn: &mut SqliteConnection,
        borrower: &str,
    ) -> PersistenceResult<Vec<LoanRequest>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE borrower = ? ORDER BY id DESC",
        )
        .bind(borrower)
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    pub async fn list_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<LoanRequest>> {
        let rows = sqlx::query_as::<_, LoanRow>("SELECT * FROM loans ORDER BY id DESC")
            .fetch_all(&mut *conn)
            .await?;
        collect(rows)
    }

    pub async fn list_by_status(
        conn: &mut SqliteConnection,
        status: LoanStatus,
    ) -> PersistenceResult<Vec<LoanRequest>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE status = ? ORDER BY id DESC",
        )
        .bind(status.as_str())
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    /// Loans still waiting on this guarantor's answer
    pub async fn pending_for_guarantor(
        conn: &mut SqliteConnection,
        guarantor: &str,
    ) -> PersistenceResult<Vec<LoanRequest>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM loans
            WHERE status = 'pending_guarantors'
              AND ((guarantor1 = ? AND guarantor1_decision IS NULL)
                OR (guarantor2 = ? AND guarantor2_decision IS NULL))
            ORDER BY id
            "#,
        )
        .bind(guarantor)
        .bind(guarantor)
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    /// Loans where the member is borrower, requester or guarantor
    pub async fn count_involving(
        conn: &mut SqliteConnection,
        member_id: &str,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM loans
            WHERE borrower = ? OR requested_by = ? OR guarantor1 = ? OR guarantor2 = ?
            "#,
        )
        .bind(member_id)
        .bind(member_id)
        .bind(member_id)
        .bind(member_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    pub async fn count(conn: &mut SqliteConnection) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM loans")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Guarantor Action Repository
// ============================================================================

/// Repository for the guarantor_actions table
pub struct GuarantorActionRepo;

impl GuarantorActionRepo {
    /// One row per (loan, guarantor); a second answer overwrites the first
    pub async fn upsert(
        conn: &mut SqliteConnection,
        loan_id: i64,
        guarantor: &str,
        decision: GuarantorDecision,
        decided_at: DateTime<Utc>,
    ) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO guarantor_actions (loan_id, guarantor, decision, decided_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(loan_id, guarantor) DO UPDATE SET
                decision = excluded.decision,
                decided_at = excluded.decided_at
            "#,
        )
        .bind(loan_id)
        .bind(guarantor)
        .bind(decision.as_str())
        .bind(decided_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn list_for_loan(
        conn: &mut SqliteConnection,
        loan_id: i64,
    ) -> PersistenceResult<Vec<GuarantorAction>> {
        let rows = sqlx::query_as::<_, GuarantorActionRow>(
            "SELECT * FROM guarantor_actions WHERE loan_id = ? ORDER BY id",
        )
        .bind(loan_id)
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }
}

// ============================================================================
// Repayment Repository
// ============================================================================

/// Repository for the loan_repayments table
pub struct RepaymentRepo;

impl RepaymentRepo {
    /// Inserts and assigns `repayment.id`
    pub async fn insert(
        conn: &mut SqliteConnection,
        repayment: &mut LoanRepayment,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO loan_repayments (loan_id, amount_paid, payment_date, installment_number,
                                         method, balance_after_payment, penalty, notes, status,
                                         created_by, approved_by, approved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(repayment.loan_id)
        .bind(repayment.amount_paid.to_string())
        .bind(repayment.payment_date)
        .bind(repayment.installment_number)
        .bind(repayment.method.as_str())
        .bind(repayment.balance_after_payment.to_string())
        .bind(repayment.penalty.to_string())
        .bind(&repayment.notes)
        .bind(repayment.status.as_str())
        .bind(&repayment.created_by)
        .bind(&repayment.approved_by)
        .bind(repayment.approved_at)
        .execute(&mut *conn)
        .await?;

        repayment.id = result.last_insert_rowid();
        Ok(())
    }

    pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<LoanRepayment> {
        sqlx::query_as::<_, RepaymentRow>("SELECT * FROM loan_repayments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Repayment", id))?
            .try_into()
    }

    /// Highest installment number ever stored for the loan, 0 if none remain
    pub async fn last_installment(
        conn: &mut SqliteConnection,
        loan_id: i64,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(installment_number), 0) FROM loan_repayments WHERE loan_id = ?",
        )
        .bind(loan_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row.0)
    }

    pub async fn list_for_loan(
        conn: &mut SqliteConnection,
        loan_id: i64,
    ) -> PersistenceResult<Vec<LoanRepayment>> {
        let rows = sqlx::query_as::<_, RepaymentRow>(
            "SELECT * FROM loan_repayments WHERE loan_id = ? ORDER BY id",
        )
        .bind(loan_id)
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    pub async fn list_for_borrower(
        conn: &mut SqliteConnection,
        borrower: &str,
    ) -> PersistenceResult<Vec<LoanRepayment>> {
        let rows = sqlx::query_as::<_, RepaymentRow>(
            r#"
            SELECT r.* FROM loan_repayments r
            JOIN loans l ON l.id = r.loan_id
            WHERE l.borrower = ?
            ORDER BY r.id DESC
            "#,
        )
        .bind(borrower)
        .fetch_all(&mut *conn)
        .await?;
        collect(rows)
    }

    pub async fn list_all(conn: &mut SqliteConnection) -> PersistenceResult<Vec<LoanRepayment>> {
        let rows = sqlx::query_as::<_, RepaymentRow>("SELECT * FROM loan_repayments ORDER BY id DESC")
            .fetch_all(&mut *conn)
            .await?;
        collect(rows)
    }

    /// Persists an approval. Returns false if the row was no longer pending.
    pub async fn approve(
        conn: &mut SqliteConnection,
        repayment: &LoanRepayment,
    ) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loan_repayments
            SET status = ?, balance_after_payment = ?, approved_by = ?, approved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(RepaymentStatus::Approved.as_str())
        .bind(repayment.balance_after_payment.to_string())
        .bind(&repayment.approved_by)
        .bind(repayment.approved_at)
        .bind(repayment.id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns false if the row was already gone
    pub async fn delete(conn: &mut SqliteConnection, id: i64) -> PersistenceResult<bool> {
        let result = sqlx::query("DELETE FROM loan_repayments WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Sum of the approved repayments still on the loan
    pub async fn sum_approved(conn: &mut SqliteConnection, loan_id: i64) -> PersistenceResult<Decimal> {
        let amounts: Vec<(String,)> = sqlx::query_as(
            "SELECT amount_paid FROM loan_repayments WHERE loan_id = ? AND status = 'approved'",
        )
        .bind(loan_id)
        .fetch_all(&mut *conn)
        .await?;
        amounts
            .iter()
            .map(|(a,)| parse_decimal("loan_repayments.amount_paid", a))
            .sum()
    }
}

// ============================================================================
// Password Reset OTP Repository
// ============================================================================

/// Repository for the password_reset_otps table
pub struct OtpRepo;

impl OtpRepo {
    /// Replaces any previous code of the member and clears its failure count
    pub async fn upsert(conn: &mut SqliteConnection, otp: &PasswordResetOtp) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_otps (member_id, code, created_at, failed_attempts)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(member_id) DO UPDATE SET
                code = excluded.code,
                created_at = excluded.created_at,
                failed_attempts = excluded.failed_attempts
            "#,
        )
        .bind(&otp.member_id)
        .bind(&otp.code)
        .bind(otp.created_at)
        .bind(otp.failed_attempts)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Counts one wrong code and returns the new total
    pub async fn record_failed_attempt(
        conn: &mut SqliteConnection,
        member_id: &str,
    ) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            UPDATE password_reset_otps SET failed_attempts = failed_attempts + 1
            WHERE member_id = ?
            RETURNING failed_attempts
            "#,
        )
        .bind(member_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| PersistenceError::not_found("PasswordResetOtp", member_id))?;
        Ok(row.0)
    }

    pub async fn find(
        conn: &mut SqliteConnection,
        member_id: &str,
    ) -> PersistenceResult<Option<PasswordResetOtp>> {
        let row = sqlx::query_as::<_, OtpRow>("SELECT * FROM password_reset_otps WHERE member_id = ?")
            .bind(member_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(PasswordResetOtp::from))
    }

    pub async fn delete(conn: &mut SqliteConnection, member_id: &str) -> PersistenceResult<()> {
        sqlx::query("DELETE FROM password_reset_otps WHERE member_id = ?")
            .bind(member_id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Connect to an existing database
pub async fn create_pool(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = SqlitePool::connect_with(connect_options(database_url)?).await?;
    Ok(pool)
}

/// File-backed connections: WAL journal, writers queue on the lock
fn connect_options(database_url: &str) -> PersistenceResult<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT))
}

/// Run the embedded migrations
pub async fn run_migrations(pool: &SqlitePool) -> PersistenceResult<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Create the database file if missing and bring the schema up to date
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool =
        SqlitePool::connect_with(connect_options(database_url)?.create_if_missing(true)).await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Migrated in-memory database on a single, never-recycled connection
pub async fn memory_database() -> PersistenceResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<std::time::Duration>)
        .max_lifetime(None::<std::time::Duration>)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sacco_core::{
        NewLoanRequest, NewMember, NewRepayment, NewTransaction, RepaymentMethod,
        TransactionSource, TransactionType,
    };

    async fn member(conn: &mut SqliteConnection, phone: &str) -> Member {
        let member = Member::register(
            NewMember {
                first_name: "Test".to_string(),
                last_name: "Member".to_string(),
                phone_number: phone.to_string(),
                email: None,
                date_of_birth: None,
            },
            Utc::now(),
        )
        .unwrap();
        MemberRepo::insert(conn, &member).await.unwrap();
        AccountRepo::insert(conn, &Account::open(&member.id, Utc::now()))
            .await
            .unwrap();
        member
    }

    #[tokio::test]
    async fn test_member_roundtrip_and_unique_phone() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let alice = member(&mut conn, "0711111111").await;
        let loaded = MemberRepo::get_by_id(&mut conn, &alice.id).await.unwrap();
        assert_eq!(loaded.phone_number, "0711111111");
        assert_eq!(loaded.status, MemberStatus::Pending);

        let found = MemberRepo::find_by_phone(&mut conn, "0711111111").await.unwrap();
        assert_eq!(found.map(|m| m.id), Some(alice.id.clone()));

        let mut duplicate = alice.clone();
        duplicate.id = Member::generate_id();
        assert!(MemberRepo::insert(&mut conn, &duplicate).await.is_err());
    }

    #[tokio::test]
    async fn test_member_approve_guard() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let alice = member(&mut conn, "0711111111").await;

        assert!(MemberRepo::approve(&mut conn, &alice.id, Utc::now()).await.unwrap());
        assert!(!MemberRepo::approve(&mut conn, &alice.id, Utc::now()).await.unwrap());
        assert!(!MemberRepo::delete_pending(&mut conn, &alice.id).await.unwrap());

        MemberRepo::update_role(&mut conn, &alice.id, Role::Treasurer).await.unwrap();
        let loaded = MemberRepo::get_by_id(&mut conn, &alice.id).await.unwrap();
        assert_eq!(loaded.role, Role::Treasurer);
        assert!(loaded.approved_at.is_some());
        assert_eq!(MemberRepo::count_with_role(&mut conn, Role::Treasurer).await.unwrap(), 1);
        assert_eq!(MemberRepo::count_with_role(&mut conn, Role::Admin).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_pending_cascades_account() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let bob = member(&mut conn, "0722222222").await;

        assert!(MemberRepo::delete_pending(&mut conn, &bob.id).await.unwrap());
        assert!(AccountRepo::get(&mut conn, &bob.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_account_version_check() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let alice = member(&mut conn, "0711111111").await;

        let mut first = AccountRepo::get(&mut conn, &alice.id).await.unwrap();
        let mut second = first.clone();

        first.credit(dec!(100), Utc::now()).unwrap();
        AccountRepo::save_balance(&mut conn, &mut first).await.unwrap();
        assert_eq!(first.version, 1);

        second.credit(dec!(50), Utc::now()).unwrap();
        let err = AccountRepo::save_balance(&mut conn, &mut second).await.unwrap_err();
        assert!(err.is_stale());

        let stored = AccountRepo::get(&mut conn, &alice.id).await.unwrap();
        assert_eq!(stored.balance(), dec!(100));
        assert_eq!(AccountRepo::total_savings(&mut conn).await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn test_emergency_fund_seeded() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let mut fund = EmergencyFundRepo::get(&mut conn).await.unwrap();
        assert_eq!(fund.id, EMERGENCY_FUND_ID);
        assert_eq!(fund.balance(), Decimal::ZERO);

        fund.credit(dec!(20), Utc::now()).unwrap();
        EmergencyFundRepo::save_balance(&mut conn, &mut fund).await.unwrap();
        assert_eq!(EmergencyFundRepo::get(&mut conn).await.unwrap().balance(), dec!(20));
    }

    #[tokio::test]
    async fn test_transaction_finalize_guard() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let alice = member(&mut conn, "0711111111").await;

        let mut tx = Transaction::create(
            NewTransaction {
                member_id: alice.id.clone(),
                tx_type: TransactionType::Deposit,
                amount: dec!(75.50),
                source: TransactionSource::Cash,
            },
            Some(&alice.id),
            Utc::now(),
        )
        .unwrap();
        TransactionRepo::insert(&mut conn, &tx).await.unwrap();

        tx.reject(Utc::now()).unwrap();
        assert!(TransactionRepo::finalize(&mut conn, &tx).await.unwrap());
        assert!(!TransactionRepo::finalize(&mut conn, &tx).await.unwrap());

        let stored = TransactionRepo::get_by_id(&mut conn, &tx.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Rejected);
        assert_eq!(stored.amount, dec!(75.50));

        let listed = TransactionRepo::list_for_member(&mut conn, &alice.id).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_loan_insert_update_and_guarantor_queue() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let borrower = member(&mut conn, "0711111111").await;
        let g1 = member(&mut conn, "0722222222").await;
        let g2 = member(&mut conn, "0733333333").await;

        let mut loan = LoanRequest::create(
            NewLoanRequest {
                borrower: borrower.id.clone(),
                amount: dec!(10000),
                guarantor1: g1.id.clone(),
                guarantor2: g2.id.clone(),
                purpose: None,
            },
            &borrower.id,
            Utc::now(),
        );
        LoanRepo::insert(&mut conn, &mut loan).await.unwrap();
        assert!(loan.id > 0);

        let queue = LoanRepo::pending_for_guarantor(&mut conn, &g1.id).await.unwrap();
        assert_eq!(queue.len(), 1);

        loan.guarantor1_decision = Some(GuarantorDecision::Accepted);
        LoanRepo::update(&mut conn, &mut loan).await.unwrap();
        GuarantorActionRepo::upsert(&mut conn, loan.id, &g1.id, GuarantorDecision::Declined, Utc::now())
            .await
            .unwrap();
        GuarantorActionRepo::upsert(&mut conn, loan.id, &g1.id, GuarantorDecision::Accepted, Utc::now())
            .await
            .unwrap();

        assert!(LoanRepo::pending_for_guarantor(&mut conn, &g1.id).await.unwrap().is_empty());
        assert_eq!(LoanRepo::pending_for_guarantor(&mut conn, &g2.id).await.unwrap().len(), 1);

        let actions = GuarantorActionRepo::list_for_loan(&mut conn, loan.id).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].decision, GuarantorDecision::Accepted);

        let mut stale = LoanRepo::get_by_id(&mut conn, loan.id).await.unwrap();
        stale.version -= 1;
        assert!(LoanRepo::update(&mut conn, &mut stale).await.unwrap_err().is_stale());
        assert_eq!(LoanRepo::count_involving(&mut conn, &g2.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repayment_queries() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let borrower = member(&mut conn, "0711111111").await;
        let g1 = member(&mut conn, "0722222222").await;
        let g2 = member(&mut conn, "0733333333").await;

        let mut loan = LoanRequest::create(
            NewLoanRequest {
                borrower: borrower.id.clone(),
                amount: dec!(1000),
                guarantor1: g1.id.clone(),
                guarantor2: g2.id.clone(),
                purpose: None,
            },
            &borrower.id,
            Utc::now(),
        );
        loan.status = LoanStatus::Approved;
        loan.total_due = dec!(1100);
        LoanRepo::insert(&mut conn, &mut loan).await.unwrap();

        let mut first = LoanRepayment::record(
            NewRepayment {
                loan_id: loan.id,
                amount_paid: dec!(300),
                method: RepaymentMethod::Mpesa,
                penalty: Decimal::ZERO,
                notes: Some("first".to_string()),
            },
            &loan,
            0,
            "SEC",
            Utc::now(),
        )
        .unwrap();
        RepaymentRepo::insert(&mut conn, &mut first).await.unwrap();
        assert_eq!(RepaymentRepo::last_installment(&mut conn, loan.id).await.unwrap(), 1);

        first.approve(&mut loan, "T", Utc::now()).unwrap();
        assert!(RepaymentRepo::approve(&mut conn, &first).await.unwrap());
        assert!(!RepaymentRepo::approve(&mut conn, &first).await.unwrap());

        assert_eq!(RepaymentRepo::sum_approved(&mut conn, loan.id).await.unwrap(), dec!(300));
        let stored = RepaymentRepo::get_by_id(&mut conn, first.id).await.unwrap();
        assert_eq!(stored.balance_after_payment, dec!(800));
        assert_eq!(
            RepaymentRepo::list_for_borrower(&mut conn, &borrower.id).await.unwrap().len(),
            1
        );

        assert!(RepaymentRepo::delete(&mut conn, first.id).await.unwrap());
        assert!(!RepaymentRepo::delete(&mut conn, first.id).await.unwrap());
        assert_eq!(RepaymentRepo::sum_approved(&mut conn, loan.id).await.unwrap(), Decimal::ZERO);
        assert_eq!(RepaymentRepo::last_installment(&mut conn, loan.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_otp_replaced() {
        let pool = memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let alice = member(&mut conn, "0711111111").await;

        let first = PasswordResetOtp::issue(&alice.id, Utc::now());
        OtpRepo::upsert(&mut conn, &first).await.unwrap();
        assert_eq!(OtpRepo::record_failed_attempt(&mut conn, &alice.id).await.unwrap(), 1);
        assert_eq!(OtpRepo::record_failed_attempt(&mut conn, &alice.id).await.unwrap(), 2);

        let mut second = PasswordResetOtp::issue(&alice.id, Utc::now());
        second.code = "123456".to_string();
        OtpRepo::upsert(&mut conn, &second).await.unwrap();

        let stored = OtpRepo::find(&mut conn, &alice.id).await.unwrap().unwrap();
        assert_eq!(stored.code, "123456");
        assert_eq!(stored.failed_attempts, 0);

        OtpRepo::delete(&mut conn, &alice.id).await.unwrap();
        assert!(OtpRepo::find(&mut conn, &alice.id).await.unwrap().is_none());
        assert!(OtpRepo::record_failed_attempt(&mut conn, &alice.id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
