//! Parser error types

use std::fmt;
use thiserror::Error;

/// Result type for parser operations
pub type ParserResult<T> = std::result::Result<T, ParserError>;

/// Error category, determined by error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ErrorCategory {
    Syntax,
    Structure,
    Operand,
    Character,
    Name,
}

/// Numeric diagnostic code attached to every [`ParserError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    // ── Syntax (1xx) ──
    pub const EXPECTED_SEPARATOR: Self = Self(100);
    pub const EXPECTED_EXPRESSION: Self = Self(101);
    pub const EXPECTED_BRACKET_LEFT: Self = Self(102);
    pub const EXPECTED_BRACKET_RIGHT: Self = Self(103);
    pub const EXPECTED_QUOTE: Self = Self(104);

    // ── Structure (2xx) ──
    pub const NESTING_TOO_DEEP: Self = Self(200);

    // ── Operands (3xx) ──
    pub const MISSING_OPERAND: Self = Self(300);

    // ── Characters (5xx) ──
    pub const UNEXPECTED_CHAR: Self = Self(500);
    pub const INVALID_SEPARATORS: Self = Self(501);

    // ── Names (1000+) ──
    pub const UNKNOWN_FUNCTION: Self = Self(1000);
    pub const UNKNOWN_IDENTIFIER: Self = Self(1001);

    /// Get the category for this error code.
    pub fn category(self) -> ErrorCategory {
        match self.0 {
            100..=199 => ErrorCategory::Syntax,
            200..=299 => ErrorCategory::Structure,
            300..=399 => ErrorCategory::Operand,
            500..=599 => ErrorCategory::Character,
            _ => ErrorCategory::Name,
        }
    }

    /// Symbolic name of a known code.
    pub fn name(self) -> &'static str {
        match self {
            Self::EXPECTED_SEPARATOR => "EXPECTED_SEPARATOR",
            Self::EXPECTED_EXPRESSION => "EXPECTED_EXPRESSION",
            Self::EXPECTED_BRACKET_LEFT => "EXPECTED_BRACKET_LEFT",
            Self::EXPECTED_BRACKET_RIGHT => "EXPECTED_BRACKET_RIGHT",
            Self::EXPECTED_QUOTE => "EXPECTED_QUOTE",
            Self::NESTING_TOO_DEEP => "NESTING_TOO_DEEP",
            Self::MISSING_OPERAND => "MISSING_OPERAND",
            Self::UNEXPECTED_CHAR => "UNEXPECTED_CHAR",
            Self::INVALID_SEPARATORS => "INVALID_SEPARATORS",
            Self::UNKNOWN_FUNCTION => "UNKNOWN_FUNCTION",
            Self::UNKNOWN_IDENTIFIER => "UNKNOWN_IDENTIFIER",
            _ => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Error raised while tokenizing or transforming a formula.
///
/// `index` is the character offset into the (trimmed) formula at which the
/// problem was detected.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{name}: {message} at index {index} [{code}]")]
pub struct ParserError {
    pub name: &'static str,
    pub message: String,
    pub index: usize,
    pub code: ErrorCode,
}

impl ParserError {
    pub fn new(message: impl Into<String>, index: usize, code: ErrorCode) -> Self {
        Self {
            name: "ParserError",
            message: message.into(),
            index,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::EXPECTED_QUOTE.category(), ErrorCategory::Syntax);
        assert_eq!(ErrorCode::MISSING_OPERAND.category(), ErrorCategory::Operand);
        assert_eq!(ErrorCode::UNEXPECTED_CHAR.category(), ErrorCategory::Character);
        assert_eq!(ErrorCode::UNKNOWN_IDENTIFIER.category(), ErrorCategory::Name);
    }

    #[test]
    fn test_error_display() {
        let err = ParserError::new("Missing ')'", 6, ErrorCode::EXPECTED_BRACKET_RIGHT);
        assert_eq!(err.name, "ParserError");
        assert_eq!(
            err.to_string(),
            "ParserError: Missing ')' at index 6 [EXPECTED_BRACKET_RIGHT(103)]"
        );
    }
}
