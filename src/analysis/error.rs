//! Error taxonomy for log parsing.

use std::path::PathBuf;

/// Failure to pull a typed field out of a classified record
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("token {index} missing (line has {len} tokens)")]
    MissingToken { index: usize, len: usize },

    #[error("token {index} ({token:?}) is not a valid {expected}")]
    InvalidNumber {
        index: usize,
        token: String,
        expected: &'static str,
    },

    #[error("entity token {token:?} carries no entity id")]
    MissingEntityId { token: String },

    #[error("entity token {token:?} carries no bandwidth component")]
    MissingBandwidth { token: String },

    #[error("unknown priority class {0:?}")]
    UnknownPriorityClass(String),

    #[error("file sharer {0:?} is neither client nor relay")]
    UnknownRole(String),

    #[error("{what} overflows ({lhs} and {rhs})")]
    OutOfRange {
        what: &'static str,
        lhs: i128,
        rhs: i128,
    },
}

impl FieldError {
    pub(crate) fn out_of_range(what: &'static str, lhs: impl Into<i128>, rhs: impl Into<i128>) -> Self {
        FieldError::OutOfRange {
            what,
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }
}

impl FieldError {
    /// Skippable errors are logged and the record dropped; the rest abort the file
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            FieldError::UnknownPriorityClass(_) | FieldError::UnknownRole(_)
        )
    }
}

/// Fatal failure while parsing one log file
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("line {line}: {source}")]
    FieldExtraction {
        line: usize,
        #[source]
        source: FieldError,
    },
}
