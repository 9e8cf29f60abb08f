//! Layered error taxonomy shared by every component.

use thiserror::Error;

/// Business-rule violations raised by the domain/application layers.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("validation: {0}")]
    Validation(String),

    #[error("charge point {0} is not connected")]
    Offline(String),

    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("operation timed out")]
    Timeout,

    #[error("charge point rejected the request: {0}")]
    Rejected(String),

    #[error("charge point returned an OCPP error [{code}]: {description}")]
    OcppError { code: String, description: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Whether a retry of the same operation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Timeout | DomainError::DispatchFailed(_))
    }
}

/// Failures originating in the state-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Top-level error returned across the HTTP façade.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
