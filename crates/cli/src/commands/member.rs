//! Membership commands

use anyhow::{bail, Result};
use sacco_business::{MembershipService, ServiceContext};
use sacco_core::NewMember;

use super::print_json;
use crate::db;
use crate::MemberAction;

/// Handle member subcommands
pub async fn handle(ctx: &ServiceContext, acting_as: Option<&str>, action: MemberAction) -> Result<()> {
    let service = MembershipService::new(ctx);

    match action {
        MemberAction::Register {
            first_name,
            last_name,
            phone,
            email,
            dob,
        } => {
            let member = service
                .register(NewMember {
                    first_name,
                    last_name,
                    phone_number: phone,
                    email,
                    date_of_birth: dob,
                })
                .await?;
            print_json(&member)?;
        }
        MemberAction::Approve { member_id } => {
            let actor = db::acting(ctx, acting_as).await?;
            print_json(&service.approve(&actor, &member_id).await?)?;
        }
        MemberAction::Reject { member_id } => {
            let actor = db::acting(ctx, acting_as).await?;
            let member = service.reject(&actor, &member_id).await?;
            println!("Rejected registration of {}", member.full_name());
        }
        MemberAction::Role { member_id, role } => {
            let actor = db::acting(ctx, acting_as).await?;
            let member = service
                .assign_role(&actor, &member_id, role.to_core_type())
                .await?;
            print_json(&member)?;
        }
        MemberAction::Pending => {
            let actor = db::acting(ctx, acting_as).await?;
            print_json(&service.list_pending(&actor).await?)?;
        }
        MemberAction::Show { member_id, phone } => {
            let member = match (member_id, phone) {
                (Some(id), _) => service.get(&id).await?,
                (None, Some(phone)) => service.find_by_phone(&phone).await?,
                (None, None) => match acting_as {
                    Some(id) => service.get(id).await?,
                    None => bail!("Give a member id, --phone or --as"),
                },
            };
            print_json(&member)?;
        }
    }

    Ok(())
}
