//! Uniform command result type.

use derive_more::Display;

/// What a command produced when it did not fail.
///
/// Errors are carried separately as `Err` values, so every command returns
/// `Result<CommandOutcome>`.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum CommandOutcome {
    /// The command did its work.
    #[display("{_0}")]
    Success(String),
    /// The command ran but there was nothing to act on or report.
    #[display("{_0}")]
    Empty(String),
}

impl CommandOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    pub fn empty(reason: impl Into<String>) -> Self {
        Self::Empty(reason.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }
}
