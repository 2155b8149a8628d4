//! # Sacco Persistence
//!
//! SQLite storage for Sacco.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sacco_persistence::{Database, MemberRepo};
//!
//! let db = Database::init("sqlite:data/sacco.db").await?;
//!
//! let mut tx = db.pool().begin().await?;
//! let member = MemberRepo::get_by_id(&mut tx, "a1b2c3d4e5f6").await?;
//! tx.commit().await?;
//! ```

pub mod error;
pub mod sqlite;

pub use error::{PersistenceError, PersistenceResult};
pub use sqlite::{
    create_pool, init_database, memory_database, run_migrations, AccountRepo, EmergencyFundRepo,
    GuarantorActionRepo, LoanRepo, MemberRepo, OtpRepo, RepaymentRepo, TransactionRepo,
};

use sqlx::SqlitePool;

/// Database facade over the SQLite pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to an existing database
    ///
    /// # Arguments
    /// * `db_url` - SQLite database URL (e.g., "sqlite:sacco.db")
    pub async fn new(db_url: &str) -> PersistenceResult<Self> {
        let pool = create_pool(db_url).await?;
        Ok(Self { pool })
    }

    /// Create the database if needed and run migrations
    pub async fn init(db_url: &str) -> PersistenceResult<Self> {
        let pool = init_database(db_url).await?;
        Ok(Self { pool })
    }

    /// Fresh migrated in-memory database
    pub async fn in_memory() -> PersistenceResult<Self> {
        let pool = memory_database().await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
