//! External collaborators invoked during a purchase.

pub mod carrier;
pub mod payment;

pub use carrier::{Carrier, HttpCarrier, InMemoryCarrier, ShipmentAddresses};
pub use payment::{HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway, PaymentStatus};
