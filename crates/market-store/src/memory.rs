use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, TransactionEvidenceId, UserId};
use domain::{
    Item, ItemStatus, NewItem, NewTransactionEvidence, NewUser, Shipping, TransactionEvidence,
    TransactionEvidenceStatus, User,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{MarketStore, StoreTx},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    items: HashMap<ItemId, Item>,
    evidences: HashMap<TransactionEvidenceId, TransactionEvidence>,
    shippings: HashMap<TransactionEvidenceId, Shipping>,
}

impl Tables {
    fn evidence_for_item(&self, item_id: ItemId) -> Option<&TransactionEvidence> {
        self.evidences.values().find(|e| e.item_id == item_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    User(UserId),
    Item(ItemId),
    Evidence(TransactionEvidenceId),
    Shipping(TransactionEvidenceId),
}

impl RowKey {
    fn not_locked(self) -> StoreError {
        let (entity, id) = match self {
            RowKey::User(id) => ("user", id.to_string()),
            RowKey::Item(id) => ("item", id.to_string()),
            RowKey::Evidence(id) => ("transaction evidence", id.to_string()),
            RowKey::Shipping(id) => ("shipping", id.to_string()),
        };
        StoreError::NotLocked { entity, id }
    }
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    /// One entry per row currently locked or awaited.
    row_locks: std::sync::Mutex<HashMap<RowKey, Arc<Mutex<()>>>>,
    user_seq: AtomicI64,
    item_seq: AtomicI64,
    evidence_seq: AtomicI64,
}

impl Shared {
    fn next(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn row_locks(&self) -> std::sync::MutexGuard<'_, HashMap<RowKey, Arc<Mutex<()>>>> {
        self.row_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases row guards, dropping lock entries no other transaction holds
    /// or waits on.
    fn release(&self, guards: impl IntoIterator<Item = (RowKey, OwnedMutexGuard<()>)>) {
        let mut locks = self.row_locks();
        for (key, guard) in guards {
            drop(guard);
            if locks
                .get(&key)
                .is_some_and(|row_lock| Arc::strong_count(row_lock) == 1)
            {
                locks.remove(&key);
            }
        }
    }
}

/// In-memory market store for tests and local runs.
///
/// Row locks are real: a second transaction locking the same row waits until
/// the first one ends. Writes are staged per transaction and applied at commit.
#[derive(Clone, Default)]
pub struct InMemoryMarketStore {
    shared: Arc<Shared>,
}

impl InMemoryMarketStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed items.
    pub async fn item_count(&self) -> usize {
        self.shared.tables.read().await.items.len()
    }

    /// Returns the number of committed purchase records.
    pub async fn transaction_evidence_count(&self) -> usize {
        self.shared.tables.read().await.evidences.len()
    }

    /// Returns the number of committed shipments.
    pub async fn shipping_count(&self) -> usize {
        self.shared.tables.read().await.shippings.len()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    type Tx = InMemoryStoreTx;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(InMemoryStoreTx {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            staged: Tables::default(),
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.shared.tables.read().await.users.get(&id).cloned())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.shared.tables.read().await.items.get(&id).cloned())
    }

    async fn get_transaction_evidence(
        &self,
        id: TransactionEvidenceId,
    ) -> Result<Option<TransactionEvidence>> {
        Ok(self.shared.tables.read().await.evidences.get(&id).cloned())
    }

    async fn find_transaction_evidence_by_item(
        &self,
        item_id: ItemId,
    ) -> Result<Option<TransactionEvidence>> {
        Ok(self
            .shared
            .tables
            .read()
            .await
            .evidence_for_item(item_id)
            .cloned())
    }

    async fn get_shipping(&self, id: TransactionEvidenceId) -> Result<Option<Shipping>> {
        Ok(self.shared.tables.read().await.shippings.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let mut tables = self.shared.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.account_name == user.account_name)
        {
            return Err(StoreError::Conflict(format!(
                "account name {} is taken",
                user.account_name
            )));
        }

        let user = User {
            id: UserId::new(Shared::next(&self.shared.user_seq)),
            account_name: user.account_name,
            address: user.address,
            num_sell_items: 0,
            last_bump: DateTime::<Utc>::UNIX_EPOCH,
            created_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}

/// Unit of work over [`InMemoryMarketStore`].
pub struct InMemoryStoreTx {
    shared: Arc<Shared>,
    held: HashMap<RowKey, OwnedMutexGuard<()>>,
    staged: Tables,
}

impl Drop for InMemoryStoreTx {
    fn drop(&mut self) {
        self.shared.release(self.held.drain());
    }
}

impl InMemoryStoreTx {
    async fn acquire(&mut self, key: RowKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let row_lock = Arc::clone(self.shared.row_locks().entry(key).or_default());
        let guard = row_lock.lock_owned().await;
        self.held.insert(key, guard);
    }

    fn ensure_locked(&self, key: RowKey) -> Result<()> {
        if self.held.contains_key(&key) {
            Ok(())
        } else {
            Err(key.not_locked())
        }
    }

    /// Locks `key` and returns the row as this transaction sees it.
    ///
    /// The lock is released again when the row does not exist.
    async fn lock_row<T: Clone>(
        &mut self,
        key: RowKey,
        select: impl Fn(&Tables) -> Option<&T>,
    ) -> Result<Option<T>> {
        let already_held = self.held.contains_key(&key);
        self.acquire(key).await;

        let row = match select(&self.staged) {
            Some(row) => Some(row.clone()),
            None => select(&*self.shared.tables.read().await).cloned(),
        };
        if row.is_none()
            && !already_held
            && let Some(guard) = self.held.remove(&key)
        {
            self.shared.release([(key, guard)]);
        }
        Ok(row)
    }
}

#[async_trait]
impl StoreTx for InMemoryStoreTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>> {
        self.lock_row(RowKey::User(id), |t| t.users.get(&id)).await
    }

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        self.lock_row(RowKey::Item(id), |t| t.items.get(&id)).await
    }

    async fn lock_transaction_evidence(
        &mut self,
        id: TransactionEvidenceId,
    ) -> Result<Option<TransactionEvidence>> {
        self.lock_row(RowKey::Evidence(id), |t| t.evidences.get(&id))
            .await
    }

    async fn lock_shipping(&mut self, id: TransactionEvidenceId) -> Result<Option<Shipping>> {
        self.lock_row(RowKey::Shipping(id), |t| t.shippings.get(&id))
            .await
    }

    async fn insert_item(&mut self, item: NewItem, now: DateTime<Utc>) -> Result<Item> {
        let item = Item {
            id: ItemId::new(Shared::next(&self.shared.item_seq)),
            seller_id: item.seller_id,
            buyer_id: None,
            status: ItemStatus::OnSale,
            name: item.name,
            price: item.price,
            description: item.description,
            image_name: item.image_name,
            category_id: item.category.id,
            created_at: now,
            updated_at: now,
        };
        self.acquire(RowKey::Item(item.id)).await;
        self.staged.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn insert_transaction_evidence(
        &mut self,
        evidence: NewTransactionEvidence,
        now: DateTime<Utc>,
    ) -> Result<TransactionEvidence> {
        let taken = self.staged.evidence_for_item(evidence.item_id).is_some()
            || self
                .shared
                .tables
                .read()
                .await
                .evidence_for_item(evidence.item_id)
                .is_some();
        if taken {
            return Err(StoreError::Conflict(format!(
                "item {} already has a transaction evidence",
                evidence.item_id
            )));
        }

        let evidence = TransactionEvidence {
            id: TransactionEvidenceId::new(Shared::next(&self.shared.evidence_seq)),
            seller_id: evidence.seller_id,
            buyer_id: evidence.buyer_id,
            status: TransactionEvidenceStatus::WaitShipping,
            item_id: evidence.item_id,
            item: evidence.item,
            created_at: now,
            updated_at: now,
        };
        self.acquire(RowKey::Evidence(evidence.id)).await;
        self.staged.evidences.insert(evidence.id, evidence.clone());
        Ok(evidence)
    }

    async fn insert_shipping(&mut self, shipping: &Shipping) -> Result<()> {
        let id = shipping.transaction_evidence_id;
        let exists = self.staged.shippings.contains_key(&id)
            || self.shared.tables.read().await.shippings.contains_key(&id);
        if exists {
            return Err(StoreError::Conflict(format!(
                "shipping for transaction evidence {id} already exists"
            )));
        }
        self.acquire(RowKey::Shipping(id)).await;
        self.staged.shippings.insert(id, shipping.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        self.ensure_locked(RowKey::User(user.id))?;
        self.staged.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_item(&mut self, item: &Item) -> Result<()> {
        self.ensure_locked(RowKey::Item(item.id))?;
        self.staged.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_transaction_evidence(&mut self, evidence: &TransactionEvidence) -> Result<()> {
        self.ensure_locked(RowKey::Evidence(evidence.id))?;
        self.staged.evidences.insert(evidence.id, evidence.clone());
        Ok(())
    }

    async fn update_shipping(&mut self, shipping: &Shipping) -> Result<()> {
        self.ensure_locked(RowKey::Shipping(shipping.transaction_evidence_id))?;
        self.staged
            .shippings
            .insert(shipping.transaction_evidence_id, shipping.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut tables = self.shared.tables.write().await;
        tables.users.extend(staged.users);
        tables.items.extend(staged.items);
        tables.evidences.extend(staged.evidences);
        tables.shippings.extend(staged.shippings);
        drop(tables);

        tracing::debug!(rows = self.held.len(), "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
