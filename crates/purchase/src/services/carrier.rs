//! Carrier contract, HTTP client and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Reservation, ShippingStatus, User};
use reqwest::{Client, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::PurchaseError;

/// Sender and recipient of a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAddresses {
    pub to_address: String,
    pub to_name: String,
    pub from_address: String,
    pub from_name: String,
}

impl ShipmentAddresses {
    /// Ships from the seller to the buyer.
    pub fn between(seller: &User, buyer: &User) -> Self {
        Self {
            to_address: buyer.address.clone(),
            to_name: buyer.account_name.clone(),
            from_address: seller.address.clone(),
            from_name: seller.account_name.clone(),
        }
    }
}

/// The shipment carrier.
#[async_trait]
pub trait Carrier: Send + Sync {
    /// Reserves a delivery.
    async fn reserve(&self, addresses: &ShipmentAddresses) -> Result<Reservation, PurchaseError>;

    /// Issues the label image for a reservation. Never returns an empty image.
    async fn fetch_label(&self, reserve_id: &str) -> Result<Vec<u8>, PurchaseError>;

    /// Returns the live status of a reservation.
    async fn poll_status(&self, reserve_id: &str) -> Result<ShippingStatus, PurchaseError>;
}

#[async_trait]
impl<T: Carrier + ?Sized> Carrier for Arc<T> {
    async fn reserve(&self, addresses: &ShipmentAddresses) -> Result<Reservation, PurchaseError> {
        (**self).reserve(addresses).await
    }

    async fn fetch_label(&self, reserve_id: &str) -> Result<Vec<u8>, PurchaseError> {
        (**self).fetch_label(reserve_id).await
    }

    async fn poll_status(&self, reserve_id: &str) -> Result<ShippingStatus, PurchaseError> {
        (**self).poll_status(reserve_id).await
    }
}

#[derive(Serialize)]
struct ReserveIdRequest<'a> {
    reserve_id: &'a str,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

fn carrier_error(e: impl std::fmt::Display) -> PurchaseError {
    PurchaseError::CarrierService(e.to_string())
}

/// HTTP client for the carrier's `/create`, `/request` and `/status` endpoints.
#[derive(Debug, Clone)]
pub struct HttpCarrier {
    client: Client,
    base_url: String,
    api_token: String,
}

impl HttpCarrier {
    /// Creates a client with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PurchaseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(carrier_error)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        })
    }

    async fn post(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::Response, PurchaseError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, &self.api_token)
            .json(body)
            .send()
            .await
            .map_err(carrier_error)?;

        if !response.status().is_success() {
            return Err(PurchaseError::CarrierService(format!(
                "{path} returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Carrier for HttpCarrier {
    async fn reserve(&self, addresses: &ShipmentAddresses) -> Result<Reservation, PurchaseError> {
        self.post("/create", addresses)
            .await?
            .json::<Reservation>()
            .await
            .map_err(carrier_error)
    }

    async fn fetch_label(&self, reserve_id: &str) -> Result<Vec<u8>, PurchaseError> {
        let bytes = self
            .post("/request", &ReserveIdRequest { reserve_id })
            .await?
            .bytes()
            .await
            .map_err(carrier_error)?;

        if bytes.is_empty() {
            return Err(PurchaseError::CarrierService(format!(
                "empty label for reservation {reserve_id}"
            )));
        }
        Ok(bytes.to_vec())
    }

    async fn poll_status(&self, reserve_id: &str) -> Result<ShippingStatus, PurchaseError> {
        let body: StatusResponse = self
            .post("/status", &ReserveIdRequest { reserve_id })
            .await?
            .json()
            .await
            .map_err(carrier_error)?;

        body.status.parse().map_err(carrier_error)
    }
}

/// Stand-in label image: the PNG signature.
pub const FAKE_LABEL: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Default)]
struct InMemoryCarrierState {
    reservations: HashMap<String, (ShipmentAddresses, ShippingStatus)>,
    next_id: u32,
    fail_on_reserve: bool,
    fail_on_label: bool,
}

/// In-memory carrier for testing.
///
/// Reservations start `initial`; issuing a label moves them to
/// `wait_pickup`. Later stages are driven by [`InMemoryCarrier::set_status`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCarrier {
    state: Arc<RwLock<InMemoryCarrierState>>,
}

impl InMemoryCarrier {
    /// Creates a new in-memory carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the carrier to fail on reservation.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_reserve = fail;
    }

    /// Configures the carrier to fail on label requests.
    pub fn set_fail_on_label(&self, fail: bool) {
        self.state.write().unwrap().fail_on_label = fail;
    }

    /// Moves a reservation to `status`, as the courier would.
    pub fn set_status(&self, reserve_id: &str, status: ShippingStatus) {
        if let Some(entry) = self.state.write().unwrap().reservations.get_mut(reserve_id) {
            entry.1 = status;
        }
    }

    /// Returns the current status of a reservation.
    pub fn status_of(&self, reserve_id: &str) -> Option<ShippingStatus> {
        self.state
            .read()
            .unwrap()
            .reservations
            .get(reserve_id)
            .map(|(_, status)| *status)
    }

    /// Returns the addresses of a reservation.
    pub fn addresses_of(&self, reserve_id: &str) -> Option<ShipmentAddresses> {
        self.state
            .read()
            .unwrap()
            .reservations
            .get(reserve_id)
            .map(|(addresses, _)| addresses.clone())
    }

    /// Returns the number of reservations made.
    pub fn reservation_count(&self) -> usize {
        self.state.read().unwrap().reservations.len()
    }
}

#[async_trait]
impl Carrier for InMemoryCarrier {
    async fn reserve(&self, addresses: &ShipmentAddresses) -> Result<Reservation, PurchaseError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_reserve {
            return Err(PurchaseError::CarrierService(
                "reservation rejected".to_string(),
            ));
        }

        state.next_id += 1;
        let reserve_id = format!("R{}", state.next_id);
        state.reservations.insert(
            reserve_id.clone(),
            (addresses.clone(), ShippingStatus::Initial),
        );

        Ok(Reservation {
            reserve_id,
            reserve_time: chrono::Utc::now().timestamp(),
        })
    }

    async fn fetch_label(&self, reserve_id: &str) -> Result<Vec<u8>, PurchaseError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_label {
            return Err(PurchaseError::CarrierService(
                "label service unavailable".to_string(),
            ));
        }

        let (_, status) = state
            .reservations
            .get_mut(reserve_id)
            .ok_or_else(|| PurchaseError::CarrierService(format!("unknown reservation {reserve_id}")))?;
        if *status == ShippingStatus::Initial {
            *status = ShippingStatus::WaitPickup;
        }
        Ok(FAKE_LABEL.to_vec())
    }

    async fn poll_status(&self, reserve_id: &str) -> Result<ShippingStatus, PurchaseError> {
        self.status_of(reserve_id)
            .ok_or_else(|| PurchaseError::CarrierService(format!("unknown reservation {reserve_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addresses() -> ShipmentAddresses {
        ShipmentAddresses {
            to_address: "north".to_string(),
            to_name: "buyer".to_string(),
            from_address: "south".to_string(),
            from_name: "seller".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sequential_reservation_ids() {
        let carrier = InMemoryCarrier::new();
        let r1 = carrier.reserve(&addresses()).await.unwrap();
        let r2 = carrier.reserve(&addresses()).await.unwrap();

        assert_eq!(r1.reserve_id, "R1");
        assert_eq!(r2.reserve_id, "R2");
        assert_eq!(carrier.reservation_count(), 2);
        assert_eq!(carrier.addresses_of("R1"), Some(addresses()));
    }

    #[tokio::test]
    async fn test_label_moves_reservation_to_wait_pickup() {
        let carrier = InMemoryCarrier::new();
        let r = carrier.reserve(&addresses()).await.unwrap();
        assert_eq!(
            carrier.poll_status(&r.reserve_id).await.unwrap(),
            ShippingStatus::Initial
        );

        let label = carrier.fetch_label(&r.reserve_id).await.unwrap();
        assert!(!label.is_empty());
        assert_eq!(
            carrier.poll_status(&r.reserve_id).await.unwrap(),
            ShippingStatus::WaitPickup
        );
    }

    #[tokio::test]
    async fn test_unknown_reservation_is_carrier_error() {
        let carrier = InMemoryCarrier::new();
        assert!(matches!(
            carrier.poll_status("R9").await,
            Err(PurchaseError::CarrierService(_))
        ));
        assert!(carrier.fetch_label("R9").await.is_err());
    }

    #[tokio::test]
    async fn test_fail_on_reserve() {
        let carrier = InMemoryCarrier::new();
        carrier.set_fail_on_reserve(true);
        assert!(carrier.reserve(&addresses()).await.is_err());
        assert_eq!(carrier.reservation_count(), 0);
    }
}
