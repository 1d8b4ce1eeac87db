//! Domain layer for the marketplace backend.
//!
//! This crate provides the persisted records and their state machines:
//! - `Item` moves `on_sale → trading → sold_out`
//! - `TransactionEvidence` moves `wait_shipping → wait_done → done`
//! - `Shipping` mirrors the carrier's `initial → wait_pickup → shipping → done`
//!
//! Status values are closed enums; every transition is a method that checks
//! the current state and refuses anything else.

pub mod category;
pub mod error;
pub mod item;
pub mod policy;
pub mod shipping;
pub mod state;
pub mod transaction;
pub mod user;

pub use category::{Category, CategoryLookup, StaticCategories};
pub use error::DomainError;
pub use item::{Item, ListingDraft, NewItem, Price};
pub use policy::MarketPolicy;
pub use shipping::{Reservation, Shipping};
pub use state::{ItemStatus, ShippingStatus, TransactionEvidenceStatus};
pub use transaction::{ItemSnapshot, NewTransactionEvidence, TransactionEvidence};
pub use user::{NewUser, User};
