//! Shipment records mirroring the carrier's reservation.

use chrono::{DateTime, Utc};
use common::{ItemId, TransactionEvidenceId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::item::Item;
use crate::state::ShippingStatus;
use crate::user::User;

/// A reservation issued by the carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reserve_id: String,
    pub reserve_time: i64,
}

/// The shipment for one purchase, keyed by its transaction evidence.
///
/// `label` is non-empty exactly when `status` is `wait_pickup` or `shipping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipping {
    pub transaction_evidence_id: TransactionEvidenceId,
    pub status: ShippingStatus,
    pub item_id: ItemId,
    pub item_name: String,
    pub reserve_id: String,
    pub reserve_time: i64,
    pub to_address: String,
    pub to_name: String,
    pub from_address: String,
    pub from_name: String,
    #[serde(skip)]
    pub label: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipping {
    /// Builds the `initial` shipment for a freshly reserved delivery.
    pub fn reserved(
        transaction_evidence_id: TransactionEvidenceId,
        item: &Item,
        reservation: Reservation,
        buyer: &User,
        seller: &User,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_evidence_id,
            status: ShippingStatus::Initial,
            item_id: item.id,
            item_name: item.name.clone(),
            reserve_id: reservation.reserve_id,
            reserve_time: reservation.reserve_time,
            to_address: buyer.address.clone(),
            to_name: buyer.account_name.clone(),
            from_address: seller.address.clone(),
            from_name: seller.account_name.clone(),
            label: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Stores the label image and moves to `wait_pickup`.
    ///
    /// Re-issuing while already in `wait_pickup` replaces the stored image.
    pub fn attach_label(&mut self, label: Vec<u8>, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_attach_label() {
            return Err(DomainError::InvalidStateTransition {
                entity: "shipping",
                current: self.status.as_str(),
                action: "attach label to",
            });
        }
        if label.is_empty() {
            return Err(DomainError::EmptyLabel);
        }
        self.label = label;
        self.status = ShippingStatus::WaitPickup;
        self.updated_at = now;
        Ok(())
    }

    /// Records a status reported by the carrier. Delivery discards the label.
    pub fn record_carrier_status(&mut self, status: ShippingStatus, now: DateTime<Utc>) {
        self.status = status;
        if !status.has_label() {
            self.label.clear();
        }
        self.updated_at = now;
    }

    /// Returns the label image if one is currently retrievable.
    pub fn current_label(&self) -> Option<&[u8]> {
        (self.status.has_label() && !self.label.is_empty()).then_some(self.label.as_slice())
    }
}
