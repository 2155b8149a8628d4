//! Business layer errors
//!
//! Wraps domain and storage errors and classifies them into the kinds a
//! request layer reports back to callers.

use sacco_core::CoreError;
use sacco_persistence::PersistenceError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Business operation errors
#[derive(Debug, Error)]
pub enum BusinessError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;

/// Caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    AlreadyProcessed,
    InvalidState,
    Forbidden,
    NotFound,
    /// Lost an optimistic-lock race; safe to re-read and retry
    Conflict,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::AlreadyProcessed => "already_processed",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl BusinessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BusinessError::Core(e) => match e {
                CoreError::Validation(_) => ErrorKind::Validation,
                CoreError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
                CoreError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
                CoreError::InvalidState { .. } => ErrorKind::InvalidState,
                CoreError::Forbidden(_) => ErrorKind::Forbidden,
                CoreError::NotFound { .. } => ErrorKind::NotFound,
            },
            BusinessError::Persistence(e) => match e {
                PersistenceError::NotFound { .. } => ErrorKind::NotFound,
                PersistenceError::StaleRecord { .. } | PersistenceError::AlreadyExists { .. } => {
                    ErrorKind::Conflict
                }
                PersistenceError::Database(sqlx::Error::Database(db)) if is_busy(db.code()) => {
                    ErrorKind::Conflict
                }
                _ => ErrorKind::Storage,
            },
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }
}

/// SQLITE_BUSY, including its extended codes
fn is_busy(code: Option<std::borrow::Cow<'_, str>>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map_or(false, |c| c & 0xff == 5)
}

impl From<sqlx::Error> for BusinessError {
    fn from(e: sqlx::Error) -> Self {
        BusinessError::Persistence(PersistenceError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_core_error_kinds() {
        let err: BusinessError = CoreError::insufficient_funds(dec!(500), dec!(300)).into();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(err.to_string(), "Insufficient funds: need 500, available 300");

        let err: BusinessError = CoreError::forbidden("not a guarantor").into();
        assert!(err.is(ErrorKind::Forbidden));
    }

    #[test]
    fn test_persistence_error_kinds() {
        let err: BusinessError = PersistenceError::stale("Account", "m1").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: BusinessError = PersistenceError::not_found("Loan", 9).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: BusinessError = PersistenceError::InvalidDecimal("x".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_busy_codes() {
        assert!(is_busy(Some("5".into())));
        assert!(is_busy(Some("517".into())));
        assert!(!is_busy(Some("2067".into())));
        assert!(!is_busy(None));
    }
}
