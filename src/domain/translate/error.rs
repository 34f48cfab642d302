//! Errors raised by the public translation operations

use thiserror::Error;

use crate::domain::DomainError;

/// Failures that abort a translation call outright
///
/// Model failures never appear here: they are recorded in the workflow
/// state and surface as an empty translation or an `error` event.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] DomainError),
}

impl TranslateError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<TranslateError> for DomainError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::InvalidArgument(message) => DomainError::validation(message),
            TranslateError::Store(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranslateError::invalid_argument("direction is required");
        assert_eq!(err.to_string(), "Invalid argument: direction is required");

        let err: TranslateError = DomainError::storage("connection refused").into();
        assert_eq!(err.to_string(), "Storage error: connection refused");
    }

    #[test]
    fn test_conversion_to_domain_error() {
        let err: DomainError = TranslateError::invalid_argument("bad").into();
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
