//! Sacco configuration with configurable policy values
//!
//! Loan and OTP parameters come from a JSON file; anything missing falls
//! back to the cooperative's standing defaults.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What happens to a loan when one of its guarantors declines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeclinePolicy {
    /// Loan stays in `pending_guarantors`; the guarantor may still change
    /// their answer.
    #[default]
    LeavePending,

    /// A single decline rejects the loan immediately.
    RejectLoan,
}

/// Configuration for the Sacco workflows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaccoConfig {
    /// Borrowing limit = savings balance x multiplier
    #[serde(default = "default_loan_multiplier")]
    pub loan_multiplier: Decimal,

    /// Flat interest charged on the approved principal, in percent
    #[serde(default = "default_interest_rate_percent")]
    pub interest_rate_percent: Decimal,

    /// Days between treasurer approval and the loan due date
    #[serde(default = "default_loan_term_days")]
    pub loan_term_days: i64,

    /// Lifetime of a password reset code
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,

    /// Wrong guesses after which a reset code is discarded
    #[serde(default = "default_otp_max_attempts")]
    pub otp_max_attempts: i64,

    #[serde(default)]
    pub guarantor_decline_policy: DeclinePolicy,
}

fn default_loan_multiplier() -> Decimal {
    Decimal::new(3, 0)
}

fn default_interest_rate_percent() -> Decimal {
    Decimal::new(10, 0)
}

fn default_loan_term_days() -> i64 {
    365
}

fn default_otp_ttl_minutes() -> i64 {
    10
}

fn default_otp_max_attempts() -> i64 {
    5
}

impl Default for SaccoConfig {
    fn default() -> Self {
        Self {
            loan_multiplier: default_loan_multiplier(),
            interest_rate_percent: default_interest_rate_percent(),
            loan_term_days: default_loan_term_days(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            otp_max_attempts: default_otp_max_attempts(),
            guarantor_decline_policy: DeclinePolicy::default(),
        }
    }
}

impl SaccoConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, std::io::Error> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn loan_term(&self) -> chrono::Duration {
        chrono::Duration::days(self.loan_term_days)
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.otp_ttl_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SaccoConfig::default();

        assert_eq!(config.loan_multiplier, dec!(3));
        assert_eq!(config.interest_rate_percent, dec!(10));
        assert_eq!(config.loan_term_days, 365);
        assert_eq!(config.otp_ttl_minutes, 10);
        assert_eq!(config.otp_max_attempts, 5);
        assert_eq!(config.guarantor_decline_policy, DeclinePolicy::LeavePending);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "interest_rate_percent": "12.5", "guarantor_decline_policy": "reject_loan" }"#;
        let config: SaccoConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.interest_rate_percent, dec!(12.5));
        assert_eq!(config.guarantor_decline_policy, DeclinePolicy::RejectLoan);
        assert_eq!(config.loan_multiplier, dec!(3));
        assert_eq!(config.loan_term_days, 365);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "loan_multiplier": "4", "otp_ttl_minutes": 5 }}"#).unwrap();

        let config = SaccoConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.loan_multiplier, dec!(4));
        assert_eq!(config.otp_ttl(), chrono::Duration::minutes(5));
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let err = SaccoConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
