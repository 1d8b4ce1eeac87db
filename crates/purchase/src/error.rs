//! Purchase error types.

use common::CategoryId;
use domain::DomainError;
use market_store::StoreError;
use thiserror::Error;

use crate::services::payment::PaymentStatus;

/// Closed classification of every purchase failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No or invalid session.
    Unauthenticated,
    /// The caller lacks the role required for this record.
    Forbidden,
    /// A referenced entity is absent.
    NotFound,
    /// The entity exists but is not in the state this step requires.
    PreconditionFailed,
    /// Malformed or out-of-range request fields.
    InvalidInput,
    /// The payment gateway or the carrier failed.
    ExternalServiceFailure,
    /// The relational store failed.
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ExternalServiceFailure => "external_service_failure",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during purchase operations.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// No session could be resolved for the caller.
    #[error("Not logged in")]
    Unauthenticated,

    /// The submitted anti-forgery token does not match the session.
    #[error("Anti-forgery token mismatch")]
    CsrfMismatch,

    /// The caller is not the seller or buyer this step requires.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The entity is not in the state this step requires.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A request field was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The payment gateway declined the capture.
    #[error("Payment rejected: {0}")]
    PaymentRejected(PaymentStatus),

    /// The payment gateway could not be reached or answered garbage.
    #[error("Payment service error: {0}")]
    PaymentService(String),

    /// The carrier could not be reached or answered garbage.
    #[error("Carrier service error: {0}")]
    CarrierService(String),

    /// An item refers to a category the lookup does not know.
    #[error("Category {0} is missing")]
    MissingCategory(CategoryId),

    /// Domain rule violation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PurchaseError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PurchaseError::Unauthenticated => ErrorKind::Unauthenticated,
            PurchaseError::CsrfMismatch | PurchaseError::Forbidden(_) => ErrorKind::Forbidden,
            PurchaseError::NotFound(_) => ErrorKind::NotFound,
            PurchaseError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            PurchaseError::InvalidInput(_) | PurchaseError::PaymentRejected(_) => {
                ErrorKind::InvalidInput
            }
            PurchaseError::PaymentService(_) | PurchaseError::CarrierService(_) => {
                ErrorKind::ExternalServiceFailure
            }
            PurchaseError::MissingCategory(_) | PurchaseError::Store(_) => {
                ErrorKind::StorageFailure
            }
            PurchaseError::Domain(e) => match e {
                DomainError::PriceOutOfRange { .. }
                | DomainError::MissingField(_)
                | DomainError::UnsupportedImage(_)
                | DomainError::InvalidCategory(_) => ErrorKind::InvalidInput,
                DomainError::InvalidStateTransition { .. } => ErrorKind::PreconditionFailed,
                DomainError::EmptyLabel => ErrorKind::ExternalServiceFailure,
                DomainError::UnknownStatus { .. } => ErrorKind::StorageFailure,
            },
        }
    }
}

/// Convenience type alias for purchase results.
pub type Result<T> = std::result::Result<T, PurchaseError>;
