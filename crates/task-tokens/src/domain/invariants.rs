//! # Domain Invariants
//!
//! Input rules checked before any asynchronous call.

use super::errors::TaskTokenError;

/// Smallest value a record may carry.
pub const MIN_TASK_VALUE: u64 = 1;

/// Reserved length for the unlocking proof: one push opcode, a DER
/// signature of at most 71 bytes and the sighash byte.
pub const UNLOCKING_SCRIPT_LENGTH: usize = 73;

/// Maximum outputs requested per discovery pass.
pub const DEFAULT_LIST_LIMIT: u32 = 1000;

/// Invariant: task text is non-empty after trimming.
pub fn validate_task_text(text: &str) -> Result<(), TaskTokenError> {
    if text.trim().is_empty() {
        return Err(TaskTokenError::EmptyTaskText);
    }
    Ok(())
}

/// Invariant: a record carries at least `MIN_TASK_VALUE`.
pub fn validate_task_value(value: u64) -> Result<(), TaskTokenError> {
    if value < MIN_TASK_VALUE {
        return Err(TaskTokenError::InvalidValue(format!(
            "{value} is below the minimum of {MIN_TASK_VALUE}"
        )));
    }
    Ok(())
}

/// Parse user-entered value text into a positive integer.
pub fn parse_task_value(text: &str) -> Result<u64, TaskTokenError> {
    let trimmed = text.trim();
    if trimmed.starts_with('-') {
        return Err(TaskTokenError::InvalidValue(format!(
            "{trimmed} is negative"
        )));
    }
    let value = trimmed
        .parse::<u64>()
        .map_err(|_| TaskTokenError::InvalidValue(format!("{trimmed:?} is not a number")))?;
    validate_task_value(value)?;
    Ok(value)
}
