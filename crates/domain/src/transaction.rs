//! Purchase records.

use chrono::{DateTime, Utc};
use common::{CategoryId, ItemId, TransactionEvidenceId, UserId};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::DomainError;
use crate::item::{Item, Price};
use crate::state::TransactionEvidenceStatus;

/// The item as it was at the moment of purchase.
///
/// Fields are read-only; later edits to the item do not reach the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    name: String,
    price: Price,
    description: String,
    category_id: CategoryId,
    root_category_id: CategoryId,
}

impl ItemSnapshot {
    /// Captures the purchase-time copy of `item`.
    pub fn capture(item: &Item, category: &Category) -> Self {
        Self {
            name: item.name.clone(),
            price: item.price,
            description: item.description.clone(),
            category_id: item.category_id,
            root_category_id: category.root_id(),
        }
    }

    /// Rebuilds a snapshot from stored columns.
    pub fn from_parts(
        name: String,
        price: Price,
        description: String,
        category_id: CategoryId,
        root_category_id: CategoryId,
    ) -> Self {
        Self {
            name,
            price,
            description,
            category_id,
            root_category_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn root_category_id(&self) -> CategoryId {
        self.root_category_id
    }
}

/// The record of a purchase. At most one exists per item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvidence {
    pub id: TransactionEvidenceId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub status: TransactionEvidenceStatus,
    pub item_id: ItemId,
    pub item: ItemSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionEvidence {
    fn invalid(&self, action: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            entity: "transaction evidence",
            current: self.status.as_str(),
            action,
        }
    }

    /// Path under which the seller can fetch the shipping label.
    pub fn label_path(&self) -> String {
        format!("/transactions/{}.png", self.id)
    }

    /// Records the carrier pickup: `wait_shipping → wait_done`.
    pub fn mark_handed_off(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_confirm_handoff() {
            return Err(self.invalid("confirm handoff of"));
        }
        self.status = TransactionEvidenceStatus::WaitDone;
        self.updated_at = now;
        Ok(())
    }

    /// Records the buyer's confirmation: `wait_done → done`.
    pub fn mark_done(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_confirm_receipt() {
            return Err(self.invalid("complete"));
        }
        self.status = TransactionEvidenceStatus::Done;
        self.updated_at = now;
        Ok(())
    }
}

/// A purchase record to insert with status `wait_shipping`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransactionEvidence {
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub item_id: ItemId,
    pub item: ItemSnapshot,
}

impl NewTransactionEvidence {
    pub fn for_purchase(item: &Item, buyer_id: UserId, category: &Category) -> Self {
        Self {
            seller_id: item.seller_id,
            buyer_id,
            item_id: item.id,
            item: ItemSnapshot::capture(item, category),
        }
    }
}
