//! # Error Module
//!
//! Domain errors for Sacco, defined with thiserror.
//!
//! Every workflow operation fails with exactly one of these kinds and leaves
//! no partial state behind.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core domain errors.
///
/// Business errors only, nothing infrastructure related.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    // === Input errors ===
    /// Malformed or out-of-policy input
    #[error("Validation error: {0}")]
    Validation(String),

    // === Ledger errors ===
    /// A debit would take the balance below zero
    #[error("Insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    // === State machine errors ===
    /// A terminal transition was applied a second time
    #[error("{entity} already processed (status: {status})")]
    AlreadyProcessed { entity: String, status: String },

    /// The record's current status does not permit the operation
    #[error("Cannot {operation} {entity} in status {status}")]
    InvalidState {
        entity: String,
        status: String,
        operation: String,
    },

    // === Access errors ===
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

/// Result type alias with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn insufficient_funds(needed: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { needed, available }
    }

    pub fn already_processed(entity: &str, status: &str) -> Self {
        Self::AlreadyProcessed {
            entity: entity.to_string(),
            status: status.to_string(),
        }
    }

    pub fn invalid_state(entity: &str, status: &str, operation: &str) -> Self {
        Self::InvalidState {
            entity: entity.to_string(),
            status: status.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, CoreError::InsufficientFunds { .. })
    }

    pub fn is_already_processed(&self) -> bool {
        matches!(self, CoreError::AlreadyProcessed { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

/// Largest amount a single money field may hold: 12 digits, 2 of them cents.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Decimal places allowed on money amounts
pub const AMOUNT_SCALE: u32 = 2;

/// Rejects zero, negative, oversized and sub-cent amounts.
pub fn ensure_positive(amount: Decimal, field: &str) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "{} must be positive: {}",
            field, amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(CoreError::validation(format!(
            "{} exceeds the maximum of {}: {}",
            field, MAX_AMOUNT, amount
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(CoreError::validation(format!(
            "{} has more than {} decimal places: {}",
            field, AMOUNT_SCALE, amount
        )));
    }
    Ok(())
}
