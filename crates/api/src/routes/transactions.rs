//! Purchase lifecycle endpoints: buy, ship, ship_done, complete and the
//! shipping label image.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use common::{ItemId, TransactionEvidenceId};
use market_store::MarketStore;
use purchase::ShipmentTicket;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct BuyRequest {
    pub csrf_token: String,
    pub item_id: ItemId,
    /// One-time payment token issued to the buyer by the payment service.
    pub token: String,
}

#[derive(Deserialize)]
pub struct ItemActionRequest {
    pub csrf_token: String,
    pub item_id: ItemId,
}

// -- Response types --

#[derive(Serialize)]
pub struct TransactionEvidenceResponse {
    pub transaction_evidence_id: TransactionEvidenceId,
}

impl From<TransactionEvidenceId> for TransactionEvidenceResponse {
    fn from(transaction_evidence_id: TransactionEvidenceId) -> Self {
        Self {
            transaction_evidence_id,
        }
    }
}

// -- Handlers --

/// POST /buy: purchase an on-sale item.
#[tracing::instrument(skip_all, fields(item_id = %req.item_id))]
pub async fn buy<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<BuyRequest>,
) -> Result<Json<TransactionEvidenceResponse>, ApiError> {
    let caller = state.caller(&headers).await?;
    let id = state
        .orchestrator
        .buy(&caller, &req.csrf_token, req.item_id, &req.token)
        .await?;
    Ok(Json(id.into()))
}

/// POST /ship: fetch the shipping label for a bought item.
#[tracing::instrument(skip_all, fields(item_id = %req.item_id))]
pub async fn ship<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<ItemActionRequest>,
) -> Result<Json<ShipmentTicket>, ApiError> {
    let caller = state.caller(&headers).await?;
    let ticket = state
        .orchestrator
        .request_shipment(&caller, &req.csrf_token, req.item_id)
        .await?;
    Ok(Json(ticket))
}

/// POST /ship_done: confirm the carrier picked the parcel up.
#[tracing::instrument(skip_all, fields(item_id = %req.item_id))]
pub async fn ship_done<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<ItemActionRequest>,
) -> Result<Json<TransactionEvidenceResponse>, ApiError> {
    let caller = state.caller(&headers).await?;
    let id = state
        .orchestrator
        .confirm_handoff(&caller, &req.csrf_token, req.item_id)
        .await?;
    Ok(Json(id.into()))
}

/// POST /complete: confirm receipt and close the purchase.
#[tracing::instrument(skip_all, fields(item_id = %req.item_id))]
pub async fn complete<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<ItemActionRequest>,
) -> Result<Json<TransactionEvidenceResponse>, ApiError> {
    let caller = state.caller(&headers).await?;
    let id = state
        .orchestrator
        .confirm_receipt(&caller, &req.csrf_token, req.item_id)
        .await?;
    Ok(Json(id.into()))
}

/// GET /transactions/{id}.png: the stored shipping label.
#[tracing::instrument(skip(state, headers))]
pub async fn label<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = state.caller(&headers).await?;
    let id = parse_label_file(&file)?;
    let png = state.orchestrator.shipment_label(caller.user_id, id).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

fn parse_label_file(file: &str) -> Result<TransactionEvidenceId, ApiError> {
    file.strip_suffix(".png")
        .and_then(|id| id.parse::<i64>().ok())
        .map(TransactionEvidenceId::new)
        .ok_or_else(|| ApiError::NotFound(format!("no label at {file}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_file() {
        assert_eq!(
            parse_label_file("42.png").unwrap(),
            TransactionEvidenceId::new(42)
        );
        assert!(parse_label_file("42").is_err());
        assert!(parse_label_file("abc.png").is_err());
    }
}
