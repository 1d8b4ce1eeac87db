//! Status machines for items, purchase records and shipments.
//!
//! Each status is persisted as its lowercase snake_case name.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Status of a listed item.
///
/// ```text
/// OnSale ──► Trading ──► SoldOut
///    │
///    └──► Stop / Cancel
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Listed and purchasable.
    #[default]
    OnSale,

    /// Bought, shipment in progress.
    Trading,

    /// Delivered and confirmed by the buyer (terminal).
    SoldOut,

    /// Withdrawn by the seller (terminal).
    Stop,

    /// Cancelled (terminal).
    Cancel,
}

impl ItemStatus {
    /// Returns true if the item can be bought in this status.
    pub fn can_buy(&self) -> bool {
        matches!(self, ItemStatus::OnSale)
    }

    /// Returns true if the listing price may be changed.
    pub fn can_edit_price(&self) -> bool {
        matches!(self, ItemStatus::OnSale)
    }

    /// Returns true while a purchase is being fulfilled.
    pub fn is_trading(&self) -> bool {
        matches!(self, ItemStatus::Trading)
    }

    /// Returns the persisted status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::OnSale => "on_sale",
            ItemStatus::Trading => "trading",
            ItemStatus::SoldOut => "sold_out",
            ItemStatus::Stop => "stop",
            ItemStatus::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_sale" => Ok(ItemStatus::OnSale),
            "trading" => Ok(ItemStatus::Trading),
            "sold_out" => Ok(ItemStatus::SoldOut),
            "stop" => Ok(ItemStatus::Stop),
            "cancel" => Ok(ItemStatus::Cancel),
            other => Err(DomainError::UnknownStatus {
                entity: "item",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a purchase record.
///
/// ```text
/// WaitShipping ──► WaitDone ──► Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionEvidenceStatus {
    /// Paid, waiting for the seller to hand the parcel over.
    #[default]
    WaitShipping,

    /// Handed to the carrier, waiting for the buyer to confirm receipt.
    WaitDone,

    /// Buyer confirmed receipt (terminal).
    Done,
}

impl TransactionEvidenceStatus {
    /// Returns true if the seller may request a shipping label.
    pub fn can_request_shipment(&self) -> bool {
        matches!(self, TransactionEvidenceStatus::WaitShipping)
    }

    /// Returns true if the seller may confirm the carrier pickup.
    pub fn can_confirm_handoff(&self) -> bool {
        matches!(self, TransactionEvidenceStatus::WaitShipping)
    }

    /// Returns true if the buyer may confirm receipt.
    pub fn can_confirm_receipt(&self) -> bool {
        matches!(self, TransactionEvidenceStatus::WaitDone)
    }

    /// Returns the persisted status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionEvidenceStatus::WaitShipping => "wait_shipping",
            TransactionEvidenceStatus::WaitDone => "wait_done",
            TransactionEvidenceStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for TransactionEvidenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionEvidenceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait_shipping" => Ok(TransactionEvidenceStatus::WaitShipping),
            "wait_done" => Ok(TransactionEvidenceStatus::WaitDone),
            "done" => Ok(TransactionEvidenceStatus::Done),
            other => Err(DomainError::UnknownStatus {
                entity: "transaction evidence",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a shipment as reported by the carrier.
///
/// ```text
/// Initial ──► WaitPickup ──► Shipping ──► Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    /// Reserved with the carrier, no label issued yet.
    #[default]
    Initial,

    /// Label issued, parcel waiting for pickup.
    WaitPickup,

    /// Parcel in transit.
    Shipping,

    /// Parcel delivered (terminal).
    Done,
}

impl ShippingStatus {
    /// Returns true if a label may be issued or re-issued.
    pub fn can_attach_label(&self) -> bool {
        matches!(self, ShippingStatus::Initial | ShippingStatus::WaitPickup)
    }

    /// Returns true while an issued label waits for the carrier pickup.
    pub fn awaits_pickup(&self) -> bool {
        matches!(self, ShippingStatus::WaitPickup)
    }

    /// Returns true if the stored label is retrievable in this status.
    pub fn has_label(&self) -> bool {
        matches!(self, ShippingStatus::WaitPickup | ShippingStatus::Shipping)
    }

    /// Returns true once the carrier has the parcel.
    pub fn is_handed_off(&self) -> bool {
        matches!(self, ShippingStatus::Shipping | ShippingStatus::Done)
    }

    /// Returns true once the parcel has been delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, ShippingStatus::Done)
    }

    /// Returns the persisted status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Initial => "initial",
            ShippingStatus::WaitPickup => "wait_pickup",
            ShippingStatus::Shipping => "shipping",
            ShippingStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShippingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(ShippingStatus::Initial),
            "wait_pickup" => Ok(ShippingStatus::WaitPickup),
            "shipping" => Ok(ShippingStatus::Shipping),
            "done" => Ok(ShippingStatus::Done),
            other => Err(DomainError::UnknownStatus {
                entity: "shipping",
                value: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_on_sale_items_can_be_bought() {
        assert!(ItemStatus::OnSale.can_buy());
        assert!(!ItemStatus::Trading.can_buy());
        assert!(!ItemStatus::SoldOut.can_buy());
        assert!(!ItemStatus::Stop.can_buy());
        assert!(!ItemStatus::Cancel.can_buy());
    }

    #[test]
    fn test_only_on_sale_prices_change() {
        assert!(ItemStatus::OnSale.can_edit_price());
        assert!(!ItemStatus::Trading.can_edit_price());
        assert!(!ItemStatus::SoldOut.can_edit_price());
    }

    #[test]
    fn test_evidence_transitions() {
        let s = TransactionEvidenceStatus::WaitShipping;
        assert!(s.can_request_shipment());
        assert!(s.can_confirm_handoff());
        assert!(!s.can_confirm_receipt());

        let s = TransactionEvidenceStatus::WaitDone;
        assert!(!s.can_request_shipment());
        assert!(!s.can_confirm_handoff());
        assert!(s.can_confirm_receipt());

        let s = TransactionEvidenceStatus::Done;
        assert!(!s.can_request_shipment());
        assert!(!s.can_confirm_handoff());
        assert!(!s.can_confirm_receipt());
    }

    #[test]
    fn test_label_visible_only_between_issue_and_delivery() {
        assert!(!ShippingStatus::Initial.has_label());
        assert!(ShippingStatus::WaitPickup.has_label());
        assert!(ShippingStatus::Shipping.has_label());
        assert!(!ShippingStatus::Done.has_label());
    }

    #[test]
    fn test_only_issued_label_awaits_pickup() {
        assert!(!ShippingStatus::Initial.awaits_pickup());
        assert!(ShippingStatus::WaitPickup.awaits_pickup());
        assert!(!ShippingStatus::Shipping.awaits_pickup());
        assert!(!ShippingStatus::Done.awaits_pickup());
    }

    #[test]
    fn test_handoff_accepts_shipping_or_done() {
        assert!(!ShippingStatus::Initial.is_handed_off());
        assert!(!ShippingStatus::WaitPickup.is_handed_off());
        assert!(ShippingStatus::Shipping.is_handed_off());
        assert!(ShippingStatus::Done.is_handed_off());
    }

    #[test]
    fn test_status_names_parse_back() {
        for status in [
            ItemStatus::OnSale,
            ItemStatus::Trading,
            ItemStatus::SoldOut,
            ItemStatus::Stop,
            ItemStatus::Cancel,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
        assert_eq!(
            "wait_pickup".parse::<ShippingStatus>().unwrap(),
            ShippingStatus::WaitPickup
        );
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "lost".parse::<ShippingStatus>().unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnknownStatus { entity: "shipping", .. }
        ));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&TransactionEvidenceStatus::WaitShipping).unwrap();
        assert_eq!(json, "\"wait_shipping\"");
        let status: ItemStatus = serde_json::from_str("\"sold_out\"").unwrap();
        assert_eq!(status, ItemStatus::SoldOut);
    }
}
