//! Error types for protobuf text-format decoding.

use thiserror::Error;

/// Result type alias for text-format decoding.
pub type TextFormatResult<T> = Result<T, TextFormatError>;

/// Errors raised while reading a protobuf text-format document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TextFormatError {
    /// The embedded descriptor set could not be loaded.
    #[error("descriptor set: {0}")]
    Descriptor(String),

    /// The requested message type is not part of the descriptor set.
    #[error("unknown message type: {0}")]
    UnknownMessage(String),

    /// Messages are nested deeper than the reader accepts.
    #[error("line {line}: message nesting exceeds {limit} levels")]
    TooDeep {
        /// 1-based line of the opening brace past the limit.
        line: usize,
        limit: usize,
    },

    /// The document is not valid text format for the message type.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The parsed message did not convert into the generated type.
    #[error("decode error: {0}")]
    Decode(String),
}

impl TextFormatError {
    /// Returns the line the error points at, if known.
    pub fn line(&self) -> Option<usize> {
        match self {
            TextFormatError::TooDeep { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TextFormatError::TooDeep { line: 4, limit: 100 };
        assert_eq!(err.to_string(), "line 4: message nesting exceeds 100 levels");
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_syntax_has_no_line() {
        let err = TextFormatError::Syntax("expected '}'".to_string());
        assert_eq!(err.to_string(), "syntax error: expected '}'");
        assert_eq!(err.line(), None);
    }
}
