//! Savings transactions, balance and emergency fund

use anyhow::Result;
use sacco_business::{ServiceContext, TransactionService};
use sacco_core::NewTransaction;
use serde_json::json;

use super::print_json;
use crate::db;
use crate::TxAction;

/// Handle tx subcommands
pub async fn handle(ctx: &ServiceContext, acting_as: Option<&str>, action: TxAction) -> Result<()> {
    let actor = db::acting(ctx, acting_as).await?;
    let service = TransactionService::new(ctx);

    match action {
        TxAction::Create {
            r#type,
            amount,
            member,
            source,
        } => {
            let transaction = service
                .create(
                    &actor,
                    NewTransaction {
                        member_id: member.unwrap_or_else(|| actor.member_id.clone()),
                        tx_type: r#type.to_core_type(),
                        amount,
                        source: source.to_core_type(),
                    },
                )
                .await?;
            print_json(&transaction)?;
        }
        TxAction::Approve { tx_id } => {
            print_json(&service.approve(&actor, &tx_id).await?)?;
        }
        TxAction::Reject { tx_id } => {
            print_json(&service.reject(&actor, &tx_id).await?)?;
        }
        TxAction::List { member, status } => {
            let transactions = match (member, status) {
                (_, Some(status)) => {
                    service
                        .list_by_status(&actor, status.to_core_type())
                        .await?
                }
                (Some(member_id), None) => service.list_for_member(&actor, &member_id).await?,
                (None, None) => service.list_for_member(&actor, &actor.member_id).await?,
            };
            print_json(&transactions)?;
        }
    }

    Ok(())
}

pub async fn show_balance(
    ctx: &ServiceContext,
    acting_as: Option<&str>,
    member_id: Option<String>,
) -> Result<()> {
    let actor = db::acting(ctx, acting_as).await?;
    let member_id = member_id.unwrap_or_else(|| actor.member_id.clone());

    let account = TransactionService::new(ctx)
        .balance(&actor, &member_id)
        .await?;
    print_json(&json!({
        "member_id": account.member_id,
        "balance": account.balance().to_string(),
        "updated_at": account.updated_at,
    }))
}

pub async fn show_fund(ctx: &ServiceContext) -> Result<()> {
    let fund = TransactionService::new(ctx).emergency_fund().await?;
    print_json(&json!({
        "balance": fund.balance().to_string(),
        "updated_at": fund.updated_at,
    }))
}
