//! Reader errors.

use thiserror::Error;

/// Errors raised while reading EDN text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdnError {
    /// The input held nothing but whitespace and comments.
    #[error("no EDN form found in input")]
    Empty,
    /// Input ended in the middle of a form.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A closing delimiter appeared without a matching opener.
    #[error("unmatched delimiter '{found}' at offset {offset}")]
    UnmatchedDelimiter {
        /// The stray delimiter.
        found: char,
        /// Byte offset of the delimiter.
        offset: usize,
    },
    /// A character that cannot start or continue a form.
    #[error("unexpected character '{found}' at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset of the character.
        offset: usize,
    },
    /// A token that looks numeric but does not parse.
    #[error("invalid number '{text}'")]
    InvalidNumber {
        /// Token text.
        text: String,
    },
    /// A token that is neither a symbol nor a keyword.
    #[error("invalid token '{text}'")]
    InvalidToken {
        /// Token text.
        text: String,
    },
    /// An unknown `\name` character literal.
    #[error("invalid character literal '\\{text}'")]
    InvalidChar {
        /// Text following the backslash.
        text: String,
    },
    /// An unsupported escape inside a string.
    #[error("invalid escape sequence '\\{found}' in string")]
    InvalidEscape {
        /// The character following the backslash.
        found: char,
    },
    /// A map literal with an unpaired key.
    #[error("map literal has an odd number of forms ({count})")]
    OddMapEntries {
        /// Number of forms found between the braces.
        count: usize,
    },
    /// Collections or tagged elements nested beyond the reader's limit.
    #[error("forms nested deeper than {limit} levels")]
    TooDeep {
        /// Maximum supported nesting depth.
        limit: usize,
    },
    /// Further forms followed the single expected form.
    #[error("unexpected trailing input at offset {offset}")]
    TrailingInput {
        /// Byte offset where the trailing input starts.
        offset: usize,
    },
}

impl EdnError {
    /// Whether more input could turn the text into a valid form.
    ///
    /// Incremental readers use this to decide between waiting for further
    /// bytes and reporting a failure.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Self::UnexpectedEof | Self::Empty)
    }

    /// Byte offset the error points at, when the reader knows it.
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Self::UnmatchedDelimiter { offset, .. }
            | Self::UnexpectedChar { offset, .. }
            | Self::TrailingInput { offset } => Some(*offset),
            _ => None,
        }
    }
}
