use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, TransactionEvidenceId, UserId};
use domain::{
    Item, NewItem, NewTransactionEvidence, NewUser, Shipping, TransactionEvidence, User,
};

use crate::Result;

/// Shared handle to the marketplace's relational store.
///
/// Reads on the handle are unlocked and only see committed rows; they are
/// meant for authorization checks. Every state decision must be re-made on a
/// row locked through [`StoreTx`].
#[async_trait]
pub trait MarketStore: Clone + Send + Sync + 'static {
    /// The unit of work opened by [`MarketStore::begin`].
    type Tx: StoreTx;

    /// Opens a unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    async fn get_transaction_evidence(
        &self,
        id: TransactionEvidenceId,
    ) -> Result<Option<TransactionEvidence>>;

    /// Returns the purchase record for an item, if the item has been bought.
    async fn find_transaction_evidence_by_item(
        &self,
        item_id: ItemId,
    ) -> Result<Option<TransactionEvidence>>;

    async fn get_shipping(&self, id: TransactionEvidenceId) -> Result<Option<Shipping>>;

    /// Registers a user. Account names are unique.
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User>;
}

/// A unit of work holding row locks until it ends.
///
/// `lock_*` blocks until the row lock is free and returns the row as this
/// transaction sees it. Locks taken by one operation are always acquired in
/// the order item, transaction evidence, shipping. Dropping the transaction
/// without calling [`StoreTx::commit`] discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>>;

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>>;

    async fn lock_transaction_evidence(
        &mut self,
        id: TransactionEvidenceId,
    ) -> Result<Option<TransactionEvidence>>;

    async fn lock_shipping(&mut self, id: TransactionEvidenceId) -> Result<Option<Shipping>>;

    /// Inserts an `on_sale` item. The new row stays locked by this transaction.
    async fn insert_item(&mut self, item: NewItem, now: DateTime<Utc>) -> Result<Item>;

    /// Inserts a `wait_shipping` purchase record.
    ///
    /// Fails with [`StoreError::Conflict`](crate::StoreError::Conflict) if the
    /// item already has one.
    async fn insert_transaction_evidence(
        &mut self,
        evidence: NewTransactionEvidence,
        now: DateTime<Utc>,
    ) -> Result<TransactionEvidence>;

    async fn insert_shipping(&mut self, shipping: &Shipping) -> Result<()>;

    async fn update_user(&mut self, user: &User) -> Result<()>;

    async fn update_item(&mut self, item: &Item) -> Result<()>;

    async fn update_transaction_evidence(&mut self, evidence: &TransactionEvidence) -> Result<()>;

    async fn update_shipping(&mut self, shipping: &Shipping) -> Result<()>;

    /// Makes every write visible and releases the locks.
    async fn commit(self) -> Result<()>;

    /// Discards every write and releases the locks.
    async fn rollback(self) -> Result<()>;
}
