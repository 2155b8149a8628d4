//! Password reset codes
//!
//! The code is printed for the operator to relay; there is no SMS gateway.

use anyhow::Result;
use sacco_business::{PasswordResetService, ServiceContext};
use serde_json::json;

use super::print_json;
use crate::OtpAction;

pub async fn handle(ctx: &ServiceContext, action: OtpAction) -> Result<()> {
    let service = PasswordResetService::new(ctx);

    match action {
        OtpAction::Request { phone } => {
            print_json(&service.request(&phone).await?)?;
        }
        OtpAction::Confirm { phone, code } => {
            let member_id = service.confirm(&phone, &code).await?;
            print_json(&json!({ "member_id": member_id, "confirmed": true }))?;
        }
    }

    Ok(())
}
