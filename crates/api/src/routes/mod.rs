//! HTTP handlers and the state they share.

pub mod health;
pub mod items;
pub mod metrics;
pub mod transactions;
pub mod users;

use std::sync::Arc;

use axum::http::HeaderMap;
use market_store::MarketStore;
use purchase::{Caller, Carrier, PaymentGateway, PurchaseOrchestrator};

use crate::error::ApiError;
use crate::session::InMemorySessions;

/// Orchestrator with the external services chosen at start-up.
pub type Orchestrator<S> = PurchaseOrchestrator<S, Arc<dyn PaymentGateway>, Arc<dyn Carrier>>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub orchestrator: Orchestrator<S>,
    pub sessions: InMemorySessions,
}

impl<S: MarketStore> AppState<S> {
    /// Resolves the calling user from the request headers.
    pub async fn caller(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        Ok(self.sessions.resolve(headers).await?)
    }
}
