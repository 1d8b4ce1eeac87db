//! User registration.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::UserId;
use market_store::MarketStore;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub account_name: String,
    pub address: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub account_name: String,
    /// Bearer token for subsequent requests.
    pub session: String,
    pub csrf_token: String,
}

/// POST /register: create a user and open a session for it.
#[tracing::instrument(skip_all)]
pub async fn register<S: MarketStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let user = state
        .orchestrator
        .register(&req.account_name, &req.address)
        .await?;
    let issued = state.sessions.issue(user.id).await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            account_name: user.account_name,
            session: issued.session,
            csrf_token: issued.csrf_token,
        }),
    ))
}
