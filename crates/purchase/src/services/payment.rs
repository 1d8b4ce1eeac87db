//! Payment gateway contract, HTTP client and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::Price;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::PurchaseError;

/// Outcome of a capture as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Ok,
    Invalid,
    Fail,
    /// Any status the gateway reports that this client does not know.
    Other(String),
}

impl PaymentStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "ok" => PaymentStatus::Ok,
            "invalid" => PaymentStatus::Invalid,
            "fail" => PaymentStatus::Fail,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PaymentStatus::Ok)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Ok => "ok",
            PaymentStatus::Invalid => "invalid",
            PaymentStatus::Fail => "fail",
            PaymentStatus::Other(s) => s,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Captures funds for a purchase.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures `price` using the buyer's one-time `token`.
    ///
    /// Returns the gateway's verdict; transport failures are errors.
    async fn capture(&self, token: &str, price: Price) -> Result<PaymentStatus, PurchaseError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn capture(&self, token: &str, price: Price) -> Result<PaymentStatus, PurchaseError> {
        (**self).capture(token, price).await
    }
}

#[derive(Serialize)]
struct CaptureRequest<'a> {
    shop_id: &'a str,
    token: &'a str,
    api_key: &'a str,
    price: i32,
}

#[derive(Deserialize)]
struct CaptureResponse {
    status: String,
}

/// HTTP client for the payment gateway's `/token` endpoint.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    shop_id: String,
    api_key: String,
}

impl HttpPaymentGateway {
    /// Creates a client with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        shop_id: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PurchaseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PurchaseError::PaymentService(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            shop_id: shop_id.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn capture(&self, token: &str, price: Price) -> Result<PaymentStatus, PurchaseError> {
        let request = CaptureRequest {
            shop_id: &self.shop_id,
            token,
            api_key: &self.api_key,
            price: price.get(),
        };

        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| PurchaseError::PaymentService(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PurchaseError::PaymentService(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        let body: CaptureResponse = response
            .json()
            .await
            .map_err(|e| PurchaseError::PaymentService(e.to_string()))?;

        Ok(PaymentStatus::parse(&body.status))
    }
}

#[derive(Debug)]
struct InMemoryPaymentState {
    outcome: PaymentStatus,
    captures: Vec<(String, Price)>,
    fail_on_capture: bool,
}

impl Default for InMemoryPaymentState {
    fn default() -> Self {
        Self {
            outcome: PaymentStatus::Ok,
            captures: Vec::new(),
            fail_on_capture: false,
        }
    }
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway that approves every capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the verdict returned for subsequent captures.
    pub fn set_outcome(&self, outcome: PaymentStatus) {
        self.state.write().unwrap().outcome = outcome;
    }

    /// Configures the gateway to fail at the transport level.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Returns the number of approved captures.
    pub fn capture_count(&self) -> usize {
        self.state.read().unwrap().captures.len()
    }

    /// Returns the approved captures as `(token, price)` pairs.
    pub fn captures(&self) -> Vec<(String, Price)> {
        self.state.read().unwrap().captures.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn capture(&self, token: &str, price: Price) -> Result<PaymentStatus, PurchaseError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_capture {
            return Err(PurchaseError::PaymentService(
                "payment gateway unavailable".to_string(),
            ));
        }

        let outcome = state.outcome.clone();
        if outcome.is_ok() {
            state.captures.push((token.to_string(), price));
        }
        Ok(outcome)
    }
}
