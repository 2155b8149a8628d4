//! Database initialization, status and acting member

use anyhow::{bail, Context, Result};
use sacco_business::{MembershipService, ServiceContext};
use sacco_core::{Actor, Member, NewMember};
use sacco_persistence::{
    AccountRepo, Database, EmergencyFundRepo, LoanRepo, MemberRepo, TransactionRepo,
};
use serde_json::json;
use std::path::Path;

fn database_url(db_path: &Path) -> String {
    format!("sqlite:{}", db_path.display())
}

/// Create the database file and apply migrations
pub async fn init_database(db_path: &Path, force: bool) -> Result<Database> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("Removed existing database");
    }

    Database::init(&database_url(db_path))
        .await
        .context("Failed to initialize database")
}

pub async fn bootstrap_admin(
    ctx: &ServiceContext,
    first_name: String,
    last_name: String,
    phone_number: String,
) -> Result<Member> {
    let admin = MembershipService::new(ctx)
        .bootstrap_admin(NewMember {
            first_name,
            last_name,
            phone_number,
            email: None,
            date_of_birth: None,
        })
        .await
        .context("Failed to create administrator")?;
    Ok(admin)
}

/// Connect to an initialized database
pub async fn connect(db_path: &Path) -> Result<Database> {
    if !db_path.exists() {
        bail!(
            "Database not found at {:?}. Run 'sacco init' first.",
            db_path
        );
    }
    Database::new(&database_url(db_path))
        .await
        .context("Failed to connect to database. Run 'sacco init' first.")
}

/// Record counts and money totals
pub async fn show_status(db_path: &Path, database: &Database) -> Result<()> {
    let mut conn = database.pool().acquire().await?;

    let status = json!({
        "path": db_path.display().to_string(),
        "members": MemberRepo::count(&mut conn).await?,
        "transactions": TransactionRepo::count(&mut conn).await?,
        "loans": LoanRepo::count(&mut conn).await?,
        "total_savings": AccountRepo::total_savings(&mut conn).await?.to_string(),
        "emergency_fund": EmergencyFundRepo::get(&mut conn).await?.balance().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Resolves `--as` to an actor with the role stored in the database
pub async fn acting(ctx: &ServiceContext, acting_as: Option<&str>) -> Result<Actor> {
    let Some(member_id) = acting_as else {
        bail!("This command needs --as <member_id>");
    };
    ctx.actor(member_id)
        .await
        .with_context(|| format!("Cannot act as member {}", member_id))
}
