//! Listing endpoints: sell, price edit, bump and item detail.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::{CategoryId, ItemId};
use domain::{Item, ListingDraft};
use market_store::MarketStore;
use purchase::ItemDetail;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct SellRequest {
    pub csrf_token: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub category_id: CategoryId,
    pub image_name: String,
}

#[derive(Deserialize)]
pub struct EditRequest {
    pub csrf_token: String,
    pub item_id: ItemId,
    pub item_price: i64,
}

#[derive(Deserialize)]
pub struct BumpRequest {
    pub csrf_token: String,
    pub item_id: ItemId,
}

// -- Response types --

#[derive(Serialize)]
pub struct SellResponse {
    pub id: ItemId,
}

/// Item fields touched by an edit or a bump. Times are unix seconds.
#[derive(Serialize)]
pub struct ItemChangeResponse {
    pub item_id: ItemId,
    pub item_price: i32,
    pub item_created_at: i64,
    pub item_updated_at: i64,
}

impl From<Item> for ItemChangeResponse {
    fn from(item: Item) -> Self {
        Self {
            item_id: item.id,
            item_price: item.price.get(),
            item_created_at: item.created_at.timestamp(),
            item_updated_at: item.updated_at.timestamp(),
        }
    }
}

// -- Handlers --

/// POST /sell: list a new item.
#[tracing::instrument(skip_all)]
pub async fn sell<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<SellRequest>,
) -> Result<(StatusCode, Json<SellResponse>), ApiError> {
    let caller = state.caller(&headers).await?;
    let draft = ListingDraft {
        name: req.name,
        description: req.description,
        price: req.price,
        category_id: req.category_id,
        image_name: req.image_name,
    };
    let item = state
        .orchestrator
        .sell(&caller, &req.csrf_token, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(SellResponse { id: item.id })))
}

/// POST /items/edit: change the price of an on-sale item.
#[tracing::instrument(skip_all, fields(item_id = %req.item_id))]
pub async fn edit<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<EditRequest>,
) -> Result<Json<ItemChangeResponse>, ApiError> {
    let caller = state.caller(&headers).await?;
    let item = state
        .orchestrator
        .edit_price(&caller, &req.csrf_token, req.item_id, req.item_price)
        .await?;
    Ok(Json(item.into()))
}

/// POST /bump: move an item to the top of the listings.
#[tracing::instrument(skip_all, fields(item_id = %req.item_id))]
pub async fn bump<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<BumpRequest>,
) -> Result<Json<ItemChangeResponse>, ApiError> {
    let caller = state.caller(&headers).await?;
    let item = state
        .orchestrator
        .bump(&caller, &req.csrf_token, req.item_id)
        .await?;
    Ok(Json(item.into()))
}

/// GET /items/{id}: item detail as seen by the caller.
#[tracing::instrument(skip(state, headers))]
pub async fn detail<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ItemDetail>, ApiError> {
    let caller = state.caller(&headers).await?;
    let detail = state
        .orchestrator
        .item_detail(caller.user_id, ItemId::new(id))
        .await?;
    Ok(Json(detail))
}
