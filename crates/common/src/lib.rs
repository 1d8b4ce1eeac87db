//! Shared types for the marketplace backend.

pub mod types;

pub use types::{CategoryId, ItemId, TransactionEvidenceId, UserId};
