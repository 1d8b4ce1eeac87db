//! Purchase orchestration for the marketplace.
//!
//! A purchase moves through four steps, each its own request:
//! 1. `buy`: lock the item, reserve a delivery, capture the payment
//! 2. `request_shipment`: the seller fetches the carrier label
//! 3. `confirm_handoff`: the seller confirms the carrier has the parcel
//! 4. `confirm_receipt`: the buyer confirms delivery and the item is sold out
//!
//! Any failure rolls the whole step back. External calls are not compensated.

pub mod error;
pub mod orchestrator;
pub mod services;
pub mod view;

pub use error::{ErrorKind, PurchaseError, Result};
pub use orchestrator::{Caller, PurchaseOrchestrator};
pub use services::{
    Carrier, HttpCarrier, HttpPaymentGateway, InMemoryCarrier, InMemoryPaymentGateway,
    PaymentGateway, PaymentStatus, ShipmentAddresses,
};
pub use view::{ItemDetail, ShipmentTicket, TransactionSummary, UserSummary};
