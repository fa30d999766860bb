use thiserror::Error;

use crate::store::StoreError;

/// Error type shared by all ledger and lifecycle services.
///
/// Validation-class errors (`InvalidInput`, `ValidationError`,
/// `InvalidPaymentAmount`) are raised before any write and leave no partial
/// effect. `InsufficientStock` is checked before the consumption write
/// commits. `PartialWrite` means an earlier step of a multi-step operation
/// already committed; nothing is rolled back automatically and the documented
/// recovery is a ledger replay (see `services::reconciliation`).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid payment amount: {0}")]
    InvalidPaymentAmount(String),

    #[error("Partial write: {0}")]
    PartialWrite(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the message suitable for surfacing to the caller. Failures are
    /// reported as a single human-readable line; the caller retries the whole
    /// operation.
    pub fn user_message(&self) -> String {
        match self {
            Self::StoreError(_) => "Storage error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }

    /// True when the operation may have left committed side effects behind.
    pub fn has_partial_effect(&self) -> bool {
        matches!(self, Self::PartialWrite(_))
    }
}
