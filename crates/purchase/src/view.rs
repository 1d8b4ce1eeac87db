//! Read models returned to callers.

use chrono::{DateTime, Utc};
use common::{ItemId, TransactionEvidenceId, UserId};
use domain::{Category, Item, ItemStatus, ShippingStatus, TransactionEvidenceStatus, User};
use serde::Serialize;

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub account_name: String,
    pub num_sell_items: i32,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            account_name: user.account_name.clone(),
            num_sell_items: user.num_sell_items,
        }
    }
}

/// Purchase progress, shown only to the seller and the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    pub transaction_evidence_id: TransactionEvidenceId,
    pub transaction_evidence_status: TransactionEvidenceStatus,
    pub shipping_status: ShippingStatus,
}

/// An item with everything its detail page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub id: ItemId,
    pub seller: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<UserSummary>,
    pub status: ItemStatus,
    pub name: String,
    pub price: i32,
    pub description: String,
    pub image_url: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionSummary>,
    pub created_at: DateTime<Utc>,
}

impl ItemDetail {
    pub(crate) fn new(
        item: &Item,
        category: Category,
        seller: &User,
        buyer: Option<&User>,
        transaction: Option<TransactionSummary>,
    ) -> Self {
        Self {
            id: item.id,
            seller: seller.into(),
            buyer: buyer.map(UserSummary::from),
            status: item.status,
            name: item.name.clone(),
            price: item.price.get(),
            description: item.description.clone(),
            image_url: item.image_url(),
            category,
            transaction,
            created_at: item.created_at,
        }
    }
}

/// What the seller needs to hand the parcel over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentTicket {
    /// Where the label image can be fetched.
    pub path: String,
    pub reserve_id: String,
}
