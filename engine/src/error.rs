//! Error types for the listsync engine.

use crate::{LocalId, Sequence, ServerId};
use thiserror::Error;

/// All possible errors from the listsync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Store errors
    #[error("line item not found: {0}")]
    NotFound(LocalId),

    #[error("invalid fields: {0}")]
    InvalidFields(String),

    #[error("duplicate server id in listing: {0}")]
    DuplicateServerId(ServerId),

    // Wire errors
    #[error("server record without '{0}' identifier")]
    MissingServerId(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    // Queue errors
    #[error("duplicate queue sequence: {0}")]
    DuplicateSequence(Sequence),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::NotFound(4);
        assert_eq!(err.to_string(), "line item not found: 4");

        let err = Error::MissingServerId("peca_item".into());
        assert_eq!(
            err.to_string(),
            "server record without 'peca_item' identifier"
        );

        let err = Error::DuplicateServerId(ServerId::Int(10));
        assert_eq!(err.to_string(), "duplicate server id in listing: 10");
    }
}
