//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every service operation returns one of these kinds; the HTTP boundary maps
/// each kind to a status code. Storage backends translate their own failures
/// into `Conflict` (unique violations) or `Internal` (everything else).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced product / category / supplier / order / item is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input failed validation (zero quantity, blank reason, negative price...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The target is in a state that forbids the operation (e.g. a non-draft PO).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A uniqueness rule was violated (duplicate code, name or email) or the
    /// target is still referenced.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable, machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::InvalidArgument(_) => "invalid_argument",
            DomainError::InvalidState(_) => "invalid_state",
            DomainError::Conflict(_) => "conflict",
            DomainError::Internal(_) => "internal",
        }
    }
}

/// Reject blank strings, returning the trimmed value.
pub fn require_non_blank(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::invalid_argument(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_non_blank_trims() {
        assert_eq!(require_non_blank("name", "  Bolts ").unwrap(), "Bolts");
    }

    #[test]
    fn require_non_blank_rejects_whitespace() {
        let err = require_non_blank("reason", " \t ").unwrap_err();
        assert_eq!(err, DomainError::InvalidArgument("reason cannot be empty".to_string()));
        assert_eq!(err.code(), "invalid_argument");
    }
}
