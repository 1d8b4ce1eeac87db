//! Marketplace users.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A registered user. Any user may both buy and sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub account_name: String,
    pub address: String,
    pub num_sell_items: i32,
    pub last_bump: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Counts a new listing. Listing also restarts the bump interval.
    pub fn record_listing(&mut self, now: DateTime<Utc>) {
        self.num_sell_items += 1;
        self.last_bump = now;
    }

    pub fn record_bump(&mut self, now: DateTime<Utc>) {
        self.last_bump = now;
    }
}

/// A user to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub account_name: String,
    pub address: String,
}

impl NewUser {
    pub fn new(
        account_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let account_name = account_name.into();
        let address = address.into();
        if account_name.trim().is_empty() {
            return Err(DomainError::MissingField("account_name"));
        }
        if address.trim().is_empty() {
            return Err(DomainError::MissingField("address"));
        }
        Ok(Self {
            account_name,
            address,
        })
    }
}
