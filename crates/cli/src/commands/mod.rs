pub mod loan;
pub mod member;
pub mod otp;
pub mod repay;
pub mod tx;

use anyhow::Result;
use serde::Serialize;

/// Prints `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
