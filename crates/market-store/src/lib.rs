//! Relational store for the marketplace.
//!
//! Two engines implement the same unit-of-work contract: [`PgMarketStore`]
//! uses `SELECT … FOR UPDATE`; [`InMemoryMarketStore`] keeps a real mutex per
//! row so lock contention behaves the same way in tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryMarketStore, InMemoryStoreTx};
pub use postgres::{PgMarketStore, PgStoreTx};
pub use store::{MarketStore, StoreTx};
