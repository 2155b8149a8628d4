//! SQLite persistence module
//!
//! Repository pattern for SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, memory_database, run_migrations, AccountRepo, EmergencyFundRepo,
    GuarantorActionRepo, LoanRepo, MemberRepo, OtpRepo, RepaymentRepo, TransactionRepo,
};
pub use schema::{
    parse_decimal, AccountRow, EmergencyFundRow, GuarantorActionRow, LoanRow, MemberRow, OtpRow,
    RepaymentRow, TransactionRow,
};
