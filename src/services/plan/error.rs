//! Notation error types
//!
//! Every variant here is a format-class failure: the producing model got
//! the notation wrong, as opposed to producing a well-formed plan with
//! wrong content. Callers key their retry policy off this distinction.

use thiserror::Error;

/// Errors raised while parsing or decoding plan notation
#[derive(Debug, Error)]
pub enum NotationError {
    #[error("unrecognized type tag: @{0}")]
    UnknownType(String),

    #[error("expected @{expected} object, found @{found}")]
    UnexpectedType { expected: &'static str, found: String },

    #[error("no notation object found in response text")]
    MissingObject,

    #[error("unmatched brace at offset {0}")]
    UnmatchedBrace(usize),

    #[error("unmatched bracket at offset {0}")]
    UnmatchedBracket(usize),

    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),

    #[error("expected {expected} at offset {offset}")]
    Expected { expected: &'static str, offset: usize },

    #[error("field '{field}': {message}")]
    Field { field: String, message: String },
}

impl NotationError {
    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field { field: field.into(), message: message.into() }
    }
}

/// Result type alias for notation operations
pub type NotationResult<T> = Result<T, NotationError>;
