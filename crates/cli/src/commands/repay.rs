//! Repayment commands

use anyhow::Result;
use sacco_business::{RepaymentService, ServiceContext};
use sacco_core::NewRepayment;

use super::print_json;
use crate::db;
use crate::RepayAction;

/// Handle repay subcommands
pub async fn handle(ctx: &ServiceContext, acting_as: Option<&str>, action: RepayAction) -> Result<()> {
    let actor = db::acting(ctx, acting_as).await?;
    let service = RepaymentService::new(ctx);

    match action {
        RepayAction::Record {
            loan_id,
            amount,
            method,
            penalty,
            notes,
        } => {
            let repayment = service
                .record(
                    &actor,
                    NewRepayment {
                        loan_id,
                        amount_paid: amount,
                        method: method.to_core_type(),
                        penalty,
                        notes,
                    },
                )
                .await?;
            print_json(&repayment)?;
        }
        RepayAction::Approve { repayment_id } => {
            print_json(&service.approve(&actor, repayment_id).await?)?;
        }
        RepayAction::Reject { repayment_id } => {
            print_json(&service.reject(&actor, repayment_id).await?)?;
        }
        RepayAction::List { loan, borrower } => {
            let repayments = match (loan, borrower) {
                (Some(loan_id), _) => service.list_for_loan(&actor, loan_id).await?,
                (None, Some(borrower)) => service.list_for_borrower(&actor, &borrower).await?,
                (None, None) => service.list_all(&actor).await?,
            };
            print_json(&repayments)?;
        }
    }

    Ok(())
}
