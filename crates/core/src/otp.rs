//! Password reset one-time codes

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Outstanding reset code of a member. At most one per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordResetOtp {
    pub member_id: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    /// Wrong codes submitted against this one so far
    pub failed_attempts: i64,
}

impl PasswordResetOtp {
    /// Fresh random 6-digit code
    pub fn issue(member_id: &str, now: DateTime<Utc>) -> Self {
        let code = rand::thread_rng().gen_range(0..1_000_000u32);
        Self {
            member_id: member_id.to_string(),
            code: format!("{:06}", code),
            created_at: now,
            failed_attempts: 0,
        }
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at + ttl
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now < self.expires_at(ttl)
    }

    /// No guesses left once `max_attempts` wrong codes were submitted
    pub fn is_exhausted(&self, max_attempts: i64) -> bool {
        self.failed_attempts >= max_attempts
    }

    /// Code must match and still be within `ttl`
    pub fn verify(&self, code: &str, now: DateTime<Utc>, ttl: Duration) -> CoreResult<()> {
        if self.code != code.trim() {
            return Err(CoreError::validation("invalid code"));
        }
        if !self.is_valid_at(now, ttl) {
            return Err(CoreError::validation("expired"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_six_digits() {
        for _ in 0..50 {
            let otp = PasswordResetOtp::issue("M1", Utc::now());
            assert_eq!(otp.code.len(), 6);
            assert!(otp.code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_verify() {
        let now = Utc::now();
        let ttl = Duration::minutes(10);
        let otp = PasswordResetOtp {
            member_id: "M1".to_string(),
            code: "042917".to_string(),
            created_at: now,
            failed_attempts: 0,
        };

        assert!(otp.verify("042917", now + Duration::minutes(9), ttl).is_ok());
        assert_eq!(
            otp.verify("000000", now, ttl).unwrap_err(),
            CoreError::validation("invalid code")
        );
        assert_eq!(
            otp.verify("042917", now + Duration::minutes(10), ttl).unwrap_err(),
            CoreError::validation("expired")
        );
    }

    #[test]
    fn test_exhausted_after_max_attempts() {
        let mut otp = PasswordResetOtp::issue("M1", Utc::now());
        assert!(!otp.is_exhausted(5));

        otp.failed_attempts = 4;
        assert!(!otp.is_exhausted(5));
        otp.failed_attempts = 5;
        assert!(otp.is_exhausted(5));
    }
}
