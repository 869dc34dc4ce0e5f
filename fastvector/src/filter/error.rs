//! Filter translation errors.

use thiserror::Error;

/// Errors translating a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The expression is not valid filter syntax.
    #[error("invalid filter at byte {position}: {message}")]
    InvalidSyntax { position: usize, message: String },

    /// The expression names a column that is not in the allowlist.
    #[error("unknown field '{0}'")]
    UnknownField(String),
}

impl FilterError {
    pub(super) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            position,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_display_carries_position() {
        let err = FilterError::syntax(7, "expected ')'");
        assert_eq!(err.to_string(), "invalid filter at byte 7: expected ')'");
    }
}
