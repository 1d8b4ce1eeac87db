//! HTTP API server for the marketplace purchase flow.
//!
//! Exposes the buy, ship, ship_done and complete steps plus listing
//! management, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::MarketPolicy;
use market_store::MarketStore;
use metrics_exporter_prometheus::PrometheusHandle;
use purchase::{
    Carrier, HttpCarrier, HttpPaymentGateway, InMemoryCarrier, InMemoryPaymentGateway,
    PaymentGateway, PurchaseError, PurchaseOrchestrator,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;
use session::InMemorySessions;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/register", post(routes::users::register::<S>))
        .route("/sell", post(routes::items::sell::<S>))
        .route("/items/edit", post(routes::items::edit::<S>))
        .route("/items/{id}", get(routes::items::detail::<S>))
        .route("/bump", post(routes::items::bump::<S>))
        .route("/buy", post(routes::transactions::buy::<S>))
        .route("/ship", post(routes::transactions::ship::<S>))
        .route("/ship_done", post(routes::transactions::ship_done::<S>))
        .route("/complete", post(routes::transactions::complete::<S>))
        .route("/transactions/{file}", get(routes::transactions::label::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store and the external services.
pub fn create_default_state<S: MarketStore>(
    store: S,
    payment: Arc<dyn PaymentGateway>,
    carrier: Arc<dyn Carrier>,
    policy: MarketPolicy,
) -> Arc<AppState<S>> {
    let orchestrator = PurchaseOrchestrator::new(store, payment, carrier).with_policy(policy);
    Arc::new(AppState {
        orchestrator,
        sessions: InMemorySessions::new(),
    })
}

/// Builds the payment and carrier clients the configuration asks for.
pub fn external_services(
    config: &Config,
) -> Result<(Arc<dyn PaymentGateway>, Arc<dyn Carrier>), PurchaseError> {
    if config.fake_external_services {
        tracing::warn!("using in-memory payment and carrier fakes");
        return Ok((
            Arc::new(InMemoryPaymentGateway::new()),
            Arc::new(InMemoryCarrier::new()),
        ));
    }

    let payment = HttpPaymentGateway::new(
        config.payment_url.as_str(),
        config.payment_shop_id.as_str(),
        config.payment_api_key.as_str(),
        config.external_timeout,
    )?;
    let carrier = HttpCarrier::new(
        config.shipment_url.as_str(),
        config.shipment_api_token.as_str(),
        config.external_timeout,
    )?;
    Ok((Arc::new(payment), Arc::new(carrier)))
}
