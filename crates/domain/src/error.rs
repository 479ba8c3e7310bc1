//! Error types for the copy job engine.

use thiserror::Error;

use crate::services::job_validator::ValidationReport;
use crate::services::schema_introspection::IntrospectionError;

/// Errors returned by the engine's operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Job {0} cannot be deleted in its current state")]
    NotDeletable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Request rejected: {0}")]
    Rejected(ValidationReport),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),
}

impl DomainError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        DomainError::Storage(err.to_string())
    }

    /// The validation report of a rejected submission.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            DomainError::Rejected(report) => Some(report),
            _ => None,
        }
    }
}
