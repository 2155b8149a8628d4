//! Sacco CLI - back office operations from the command line
//!
//! Usage:
//! ```bash
//! sacco init --admin-first-name Ada --admin-last-name Njeri --admin-phone 0700000000
//! sacco --as <admin_id> member approve <member_id>
//! sacco --as <member_id> tx create deposit 500 --source mpesa
//! sacco --as <treasurer_id> tx approve <tx_id>
//! sacco --as <member_id> loan request 10000 --guarantor1 <g1> --guarantor2 <g2>
//! sacco --as <treasurer_id> loan decide 1 approve --amount 8000
//! ```
//!
//! Set `RUST_LOG=debug` for workflow logs on stderr.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use sacco_business::ServiceContext;
use sacco_core::SaccoConfig;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod db;

use commands::{loan, member, otp, repay, tx};

/// Sacco - savings and credit cooperative back office
#[derive(Parser)]
#[command(name = "sacco")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path
    #[arg(long, default_value = "data/sacco.db", global = true)]
    pub db: PathBuf,

    /// JSON policy file (loan multiplier, interest rate, ...)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Member id of the person running the command
    #[arg(long = "as", global = true)]
    pub acting_as: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database and optionally the first administrator
    Init {
        /// Delete an existing database first
        #[arg(long)]
        force: bool,
        #[arg(long, requires_all = ["admin_last_name", "admin_phone"])]
        admin_first_name: Option<String>,
        #[arg(long)]
        admin_last_name: Option<String>,
        #[arg(long)]
        admin_phone: Option<String>,
    },

    /// Show database status
    Status,

    /// Membership management
    Member {
        #[command(subcommand)]
        action: MemberAction,
    },

    /// Deposits, withdrawals and emergency contributions
    Tx {
        #[command(subcommand)]
        action: TxAction,
    },

    /// Show the emergency fund
    Fund,

    /// Show a member's savings balance
    Balance {
        /// Member ID (defaults to --as)
        member_id: Option<String>,
    },

    /// Loan requests and decisions
    Loan {
        #[command(subcommand)]
        action: LoanAction,
    },

    /// Loan repayments
    Repay {
        #[command(subcommand)]
        action: RepayAction,
    },

    /// Password reset codes
    Otp {
        #[command(subcommand)]
        action: OtpAction,
    },
}

#[derive(Subcommand)]
pub enum MemberAction {
    /// Register a new (pending) member
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// 10-digit phone number
        #[arg(long)]
        phone: String,
        #[arg(long)]
        email: Option<String>,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<NaiveDate>,
    },
    /// Activate a pending member
    Approve { member_id: String },
    /// Turn down a pending registration
    Reject { member_id: String },
    /// Assign a role
    Role { member_id: String, role: RoleArg },
    /// List pending registrations
    Pending,
    /// Show a member by id or phone
    Show {
        member_id: Option<String>,
        #[arg(long, conflicts_with = "member_id")]
        phone: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TxAction {
    /// Record a pending transaction
    Create {
        r#type: TxTypeArg,
        amount: Decimal,
        /// Account owner (defaults to --as)
        #[arg(long)]
        member: Option<String>,
        #[arg(long, default_value = "mpesa")]
        source: SourceArg,
    },
    /// Approve a pending transaction
    Approve { tx_id: String },
    /// Reject a pending transaction
    Reject { tx_id: String },
    /// List transactions of a member, or all with a given status
    List {
        #[arg(long, conflicts_with = "status")]
        member: Option<String>,
        #[arg(long)]
        status: Option<TxStatusArg>,
    },
}

#[derive(Subcommand)]
pub enum LoanAction {
    /// Request a loan
    Request {
        amount: Decimal,
        #[arg(long)]
        guarantor1: String,
        #[arg(long)]
        guarantor2: String,
        /// Borrower (defaults to --as)
        #[arg(long)]
        borrower: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
    },
    /// Answer as guarantor
    Guarantor {
        loan_id: i64,
        decision: GuarantorDecisionArg,
    },
    /// Loans waiting on your guarantee
    PendingGuarantees,
    /// Treasurer decision
    Decide {
        loan_id: i64,
        decision: TreasurerDecisionArg,
        /// Approved amount (defaults to the requested amount)
        #[arg(long)]
        amount: Option<Decimal>,
    },
    /// Withdraw a request before the treasurer decides
    Cancel { loan_id: i64 },
    /// Show one loan with its guarantor answers
    Show { loan_id: i64 },
    /// List loans of a borrower, or all loans
    List {
        #[arg(long, conflicts_with = "status")]
        borrower: Option<String>,
        #[arg(long)]
        status: Option<LoanStatusArg>,
    },
    /// How much a member may borrow
    Eligibility { member_id: Option<String> },
}

#[derive(Subcommand)]
pub enum RepayAction {
    /// Record an installment
    Record {
        loan_id: i64,
        amount: Decimal,
        #[arg(long, default_value = "cash")]
        method: MethodArg,
        #[arg(long, default_value = "0")]
        penalty: Decimal,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Approve a recorded installment
    Approve { repayment_id: i64 },
    /// Delete an installment and recompute the loan
    Reject { repayment_id: i64 },
    /// List repayments of a loan, a borrower, or all
    List {
        #[arg(long, conflicts_with = "borrower")]
        loan: Option<i64>,
        #[arg(long)]
        borrower: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum OtpAction {
    /// Issue a reset code for a phone number
    Request { phone: String },
    /// Check and consume a reset code
    Confirm { phone: String, code: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Member,
    Secretary,
    Treasurer,
    Admin,
}

impl RoleArg {
    pub fn to_core_type(&self) -> sacco_core::Role {
        match self {
            RoleArg::Member => sacco_core::Role::Member,
            RoleArg::Secretary => sacco_core::Role::Secretary,
            RoleArg::Treasurer => sacco_core::Role::Treasurer,
            RoleArg::Admin => sacco_core::Role::Admin,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TxTypeArg {
    Deposit,
    Withdrawal,
    Emergency,
}

impl TxTypeArg {
    pub fn to_core_type(&self) -> sacco_core::TransactionType {
        match self {
            TxTypeArg::Deposit => sacco_core::TransactionType::Deposit,
            TxTypeArg::Withdrawal => sacco_core::TransactionType::Withdrawal,
            TxTypeArg::Emergency => sacco_core::TransactionType::Emergency,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceArg {
    Mpesa,
    Cash,
}

impl SourceArg {
    pub fn to_core_type(&self) -> sacco_core::TransactionSource {
        match self {
            SourceArg::Mpesa => sacco_core::TransactionSource::Mpesa,
            SourceArg::Cash => sacco_core::TransactionSource::Cash,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TxStatusArg {
    Pending,
    Approved,
    Rejected,
}

impl TxStatusArg {
    pub fn to_core_type(&self) -> sacco_core::TransactionStatus {
        match self {
            TxStatusArg::Pending => sacco_core::TransactionStatus::Pending,
            TxStatusArg::Approved => sacco_core::TransactionStatus::Approved,
            TxStatusArg::Rejected => sacco_core::TransactionStatus::Rejected,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GuarantorDecisionArg {
    Accept,
    Decline,
}

impl GuarantorDecisionArg {
    pub fn to_core_type(&self) -> sacco_core::GuarantorDecision {
        match self {
            GuarantorDecisionArg::Accept => sacco_core::GuarantorDecision::Accepted,
            GuarantorDecisionArg::Decline => sacco_core::GuarantorDecision::Declined,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TreasurerDecisionArg {
    Approve,
    Reject,
}

impl TreasurerDecisionArg {
    pub fn to_core_type(&self) -> sacco_core::TreasurerDecision {
        match self {
            TreasurerDecisionArg::Approve => sacco_core::TreasurerDecision::Approved,
            TreasurerDecisionArg::Reject => sacco_core::TreasurerDecision::Rejected,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LoanStatusArg {
    PendingGuarantors,
    PendingTreasurer,
    Approved,
    RepaymentInProgress,
    Repaid,
    Rejected,
    Cancelled,
}

impl LoanStatusArg {
    pub fn to_core_type(&self) -> sacco_core::LoanStatus {
        match self {
            LoanStatusArg::PendingGuarantors => sacco_core::LoanStatus::PendingGuarantors,
            LoanStatusArg::PendingTreasurer => sacco_core::LoanStatus::PendingTreasurer,
            LoanStatusArg::Approved => sacco_core::LoanStatus::Approved,
            LoanStatusArg::RepaymentInProgress => sacco_core::LoanStatus::RepaymentInProgress,
            LoanStatusArg::Repaid => sacco_core::LoanStatus::Repaid,
            LoanStatusArg::Rejected => sacco_core::LoanStatus::Rejected,
            LoanStatusArg::Cancelled => sacco_core::LoanStatus::Cancelled,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MethodArg {
    Cash,
    BankTransfer,
    Mpesa,
}

impl MethodArg {
    pub fn to_core_type(&self) -> sacco_core::RepaymentMethod {
        match self {
            MethodArg::Cash => sacco_core::RepaymentMethod::Cash,
            MethodArg::BankTransfer => sacco_core::RepaymentMethod::BankTransfer,
            MethodArg::Mpesa => sacco_core::RepaymentMethod::Mpesa,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = SaccoConfig::load(cli.config.as_deref())
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;

    if let Some(parent) = cli.db.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    if let Commands::Init {
        force,
        admin_first_name,
        admin_last_name,
        admin_phone,
    } = cli.command
    {
        let database = db::init_database(&cli.db, force).await?;
        let ctx = ServiceContext::new(&database, config);
        let admin = match (admin_first_name, admin_last_name, admin_phone) {
            (Some(first_name), Some(last_name), Some(phone)) => {
                Some(db::bootstrap_admin(&ctx, first_name, last_name, phone).await?)
            }
            _ => None,
        };
        println!("Database initialized at {:?}", cli.db);
        if let Some(admin) = admin {
            commands::print_json(&admin)?;
        }
        database.close().await;
        return Ok(());
    }

    let database = db::connect(&cli.db).await?;
    debug!(db = ?cli.db, acting_as = ?cli.acting_as, "Connected");
    let ctx = ServiceContext::new(&database, config);
    let acting_as = cli.acting_as.as_deref();

    match cli.command {
        Commands::Init { .. } => {}

        Commands::Status => {
            db::show_status(&cli.db, &database).await?;
        }

        Commands::Member { action } => {
            member::handle(&ctx, acting_as, action).await?;
        }

        Commands::Tx { action } => {
            tx::handle(&ctx, acting_as, action).await?;
        }

        Commands::Fund => {
            tx::show_fund(&ctx).await?;
        }

        Commands::Balance { member_id } => {
            tx::show_balance(&ctx, acting_as, member_id).await?;
        }

        Commands::Loan { action } => {
            loan::handle(&ctx, acting_as, action).await?;
        }

        Commands::Repay { action } => {
            repay::handle(&ctx, acting_as, action).await?;
        }

        Commands::Otp { action } => {
            otp::handle(&ctx, action).await?;
        }
    }

    database.close().await;
    Ok(())
}
