//! Domain error types.

use common::CategoryId;
use thiserror::Error;

/// Errors raised by domain validation and state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Price outside the allowed listing range.
    #[error("Price {price} is out of range: must be between {min} and {max}")]
    PriceOutOfRange { price: i64, min: i32, max: i32 },

    /// A record is not in the state required for the action.
    #[error("Invalid state transition: cannot {action} {entity} in {current} state")]
    InvalidStateTransition {
        entity: &'static str,
        current: &'static str,
        action: &'static str,
    },

    /// A persisted status string did not match any known state.
    #[error("Unknown {entity} status: {value}")]
    UnknownStatus { entity: &'static str, value: String },

    /// A required listing field was empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The image reference does not name a supported format.
    #[error("Unsupported image format: {0}")]
    UnsupportedImage(String),

    /// The category does not exist or cannot hold items.
    #[error("Invalid category: {0}")]
    InvalidCategory(CategoryId),

    /// A shipment label must carry image bytes.
    #[error("Shipment label is empty")]
    EmptyLabel,
}
