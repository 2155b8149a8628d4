//! Service context shared by the workflow services

use sacco_core::{Actor, CoreError, SaccoConfig};
use sacco_persistence::{Database, MemberRepo};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::BusinessResult;

/// Context for business operations - database access plus policy
#[derive(Clone)]
pub struct ServiceContext {
    pool: SqlitePool,
    config: SaccoConfig,
}

impl ServiceContext {
    pub fn new(db: &Database, config: SaccoConfig) -> Self {
        Self {
            pool: db.pool().clone(),
            config,
        }
    }

    pub fn from_pool(pool: SqlitePool, config: SaccoConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &SaccoConfig {
        &self.config
    }

    /// Opens a transaction that takes the SQLite write lock up front.
    ///
    /// A concurrent writer waits for the lock and then sees the committed
    /// state, so its status and version guards decide the outcome.
    pub async fn begin_write(&self) -> BusinessResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Actor for a stored member, role taken from the database.
    ///
    /// Members still awaiting approval cannot act.
    pub async fn actor(&self, member_id: &str) -> BusinessResult<Actor> {
        let mut conn = self.pool.acquire().await?;
        let member = MemberRepo::get_by_id(&mut conn, member_id).await?;
        if !member.is_active() {
            return Err(CoreError::forbidden(format!(
                "member {} has not been approved yet",
                member.id
            ))
            .into());
        }
        Ok(member.actor())
    }
}
