//! Loan commands

use anyhow::Result;
use sacco_business::{LoanService, ServiceContext};
use sacco_core::NewLoanRequest;
use serde_json::json;

use super::print_json;
use crate::db;
use crate::LoanAction;

/// Handle loan subcommands
pub async fn handle(ctx: &ServiceContext, acting_as: Option<&str>, action: LoanAction) -> Result<()> {
    let actor = db::acting(ctx, acting_as).await?;
    let service = LoanService::new(ctx);

    match action {
        LoanAction::Request {
            amount,
            guarantor1,
            guarantor2,
            borrower,
            purpose,
        } => {
            let loan = service
                .create(
                    &actor,
                    NewLoanRequest {
                        borrower: borrower.unwrap_or_else(|| actor.member_id.clone()),
                        amount,
                        guarantor1,
                        guarantor2,
                        purpose,
                    },
                )
                .await?;
            print_json(&loan)?;
        }
        LoanAction::Guarantor { loan_id, decision } => {
            let loan = service
                .guarantor_decide(&actor, loan_id, decision.to_core_type())
                .await?;
            print_json(&loan)?;
        }
        LoanAction::PendingGuarantees => {
            print_json(&service.pending_guarantor_requests(&actor).await?)?;
        }
        LoanAction::Decide {
            loan_id,
            decision,
            amount,
        } => {
            let loan = service
                .treasurer_decide(&actor, loan_id, decision.to_core_type(), amount)
                .await?;
            print_json(&loan)?;
        }
        LoanAction::Cancel { loan_id } => {
            print_json(&service.cancel(&actor, loan_id).await?)?;
        }
        LoanAction::Show { loan_id } => {
            let loan = service.get(&actor, loan_id).await?;
            let guarantor_actions = service.guarantor_actions(loan_id).await?;
            print_json(&json!({
                "loan": loan,
                "outstanding": loan.outstanding().to_string(),
                "guarantor_actions": guarantor_actions,
            }))?;
        }
        LoanAction::List { borrower, status } => {
            let loans = match borrower {
                Some(borrower) => service.list_for_borrower(&actor, &borrower).await?,
                None => {
                    service
                        .list_all(&actor, status.map(|s| s.to_core_type()))
                        .await?
                }
            };
            print_json(&loans)?;
        }
        LoanAction::Eligibility { member_id } => {
            let member_id = member_id.unwrap_or_else(|| actor.member_id.clone());
            print_json(&service.eligibility(&actor, &member_id).await?)?;
        }
    }

    Ok(())
}
