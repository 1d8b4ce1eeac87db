//! Listed items and the rules for creating them.

use chrono::{DateTime, Utc};
use common::{CategoryId, ItemId, UserId};
use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryLookup};
use crate::error::DomainError;
use crate::state::ItemStatus;

/// A listing price, always within the marketplace bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Price(i32);

impl Price {
    pub const MIN: i32 = 100;
    pub const MAX: i32 = 1_000_000;

    /// Validates a raw price.
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(DomainError::PriceOutOfRange {
                price: value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(Self(value as i32))
    }

    pub fn get(&self) -> i32 {
        self.0
    }
}

impl TryFrom<i64> for Price {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for i32 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listed item.
///
/// `buyer_id` is set exactly when the item has been bought; it is never
/// cleared afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub seller_id: UserId,
    pub buyer_id: Option<UserId>,
    pub status: ItemStatus,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub image_name: String,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    fn invalid(&self, action: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            entity: "item",
            current: self.status.as_str(),
            action,
        }
    }

    /// Returns true if `user` is the seller or the buyer.
    pub fn is_party(&self, user: UserId) -> bool {
        self.seller_id == user || self.buyer_id == Some(user)
    }

    /// Public path of the item's image.
    pub fn image_url(&self) -> String {
        format!("/upload/{}", self.image_name)
    }

    /// Records a purchase: `on_sale → trading`.
    pub fn start_trading(&mut self, buyer: UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_buy() {
            return Err(self.invalid("buy"));
        }
        self.buyer_id = Some(buyer);
        self.status = ItemStatus::Trading;
        self.updated_at = now;
        Ok(())
    }

    /// Records the buyer's confirmation of receipt: `trading → sold_out`.
    pub fn mark_sold_out(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.is_trading() {
            return Err(self.invalid("complete"));
        }
        self.status = ItemStatus::SoldOut;
        self.updated_at = now;
        Ok(())
    }

    /// Changes the price of an item that is still on sale.
    pub fn change_price(&mut self, price: Price, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_edit_price() {
            return Err(self.invalid("edit"));
        }
        self.price = price;
        self.updated_at = now;
        Ok(())
    }

    /// Moves the item to the front of the listing order.
    pub fn bump(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }
}

/// Accepted image extensions for listings.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// A listing as submitted by a seller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDraft {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub category_id: CategoryId,
    pub image_name: String,
}

impl ListingDraft {
    /// Validates the draft and returns the item to insert.
    pub fn validate(
        self,
        seller_id: UserId,
        categories: &dyn CategoryLookup,
    ) -> Result<NewItem, DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::MissingField("name"));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::MissingField("description"));
        }
        let price = Price::new(self.price)?;

        let category = categories
            .category(self.category_id)
            .filter(|c| !c.is_root())
            .ok_or(DomainError::InvalidCategory(self.category_id))?;

        let ext = self
            .image_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(DomainError::UnsupportedImage(self.image_name));
        }

        Ok(NewItem {
            seller_id,
            name: self.name,
            price,
            description: self.description,
            image_name: self.image_name,
            category,
        })
    }
}

/// A validated listing ready to insert with status `on_sale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub seller_id: UserId,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub image_name: String,
    pub category: Category,
}
