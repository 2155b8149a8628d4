//! Password reset by one-time code
//!
//! Delivery of the code (SMS) and the password change itself happen outside
//! this crate. The service only issues and checks codes.

use crate::error::BusinessResult;
use crate::services::ServiceContext;
use chrono::{DateTime, Utc};
use sacco_core::{CoreError, PasswordResetOtp};
use sacco_persistence::{MemberRepo, OtpRepo};
use serde::Serialize;
use tracing::{info, warn};

/// Code handed to the delivery channel
#[derive(Debug, Clone, Serialize)]
pub struct IssuedOtp {
    pub member_id: String,
    pub phone_number: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

pub struct PasswordResetService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PasswordResetService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Issues a fresh code, replacing any earlier one
    pub async fn request(&self, phone_number: &str) -> BusinessResult<IssuedOtp> {
        let mut db = self.ctx.begin_write().await?;
        let member = MemberRepo::find_by_phone(&mut db, phone_number)
            .await?
            .ok_or_else(|| CoreError::not_found("Member", phone_number))?;

        let otp = PasswordResetOtp::issue(&member.id, Utc::now());
        OtpRepo::upsert(&mut db, &otp).await?;
        db.commit().await?;

        let expires_at = otp.expires_at(self.ctx.config().otp_ttl());
        info!(member_id = %member.id, %expires_at, "Password reset code issued");

        Ok(IssuedOtp {
            member_id: member.id,
            phone_number: member.phone_number,
            code: otp.code,
            expires_at,
        })
    }

    /// Consumes a matching, unexpired code and returns the member it belongs to.
    ///
    /// Every wrong code is counted; after `otp_max_attempts` of them the code
    /// is discarded and a new one must be requested.
    pub async fn confirm(&self, phone_number: &str, code: &str) -> BusinessResult<String> {
        let mut db = self.ctx.begin_write().await?;
        let member = MemberRepo::find_by_phone(&mut db, phone_number)
            .await?
            .ok_or_else(|| CoreError::not_found("Member", phone_number))?;

        let otp = OtpRepo::find(&mut db, &member.id)
            .await?
            .ok_or_else(|| CoreError::validation("invalid code"))?;
        if let Err(e) = otp.verify(code, Utc::now(), self.ctx.config().otp_ttl()) {
            let failed_attempts = OtpRepo::record_failed_attempt(&mut db, &member.id).await?;
            let discarded = PasswordResetOtp {
                failed_attempts,
                ..otp
            }
            .is_exhausted(self.ctx.config().otp_max_attempts);
            if discarded {
                OtpRepo::delete(&mut db, &member.id).await?;
            }
            db.commit().await?;

            warn!(
                member_id = %member.id,
                failed_attempts,
                discarded,
                error = %e,
                "Password reset code refused"
            );
            return Err(e.into());
        }

        OtpRepo::delete(&mut db, &member.id).await?;
        db.commit().await?;

        info!(member_id = %member.id, "Password reset code confirmed");
        Ok(member.id)
    }
}
