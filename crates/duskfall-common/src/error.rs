//! Error types shared across Duskfall subsystems.

use thiserror::Error;

/// Error returned when a string does not name a valid body location.
#[derive(Debug, Clone, Error)]
#[error("invalid body location: {input:?}")]
pub struct ParseBodyPartError {
    /// The rejected input.
    input: String,
}

impl ParseBodyPartError {
    /// Creates a new parse error for the given input.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the rejected input.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }
}
