//! Session lookup for bearer tokens issued at registration.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use common::UserId;
use purchase::{Caller, PurchaseError};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Credentials handed to a client after registration.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub session: String,
    pub csrf_token: String,
}

/// In-process session table.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessions {
    sessions: Arc<RwLock<HashMap<String, Caller>>>,
}

impl InMemorySessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for `user_id` with a fresh anti-forgery token.
    pub async fn issue(&self, user_id: UserId) -> IssuedSession {
        let session = Uuid::new_v4().simple().to_string();
        let csrf_token = Uuid::new_v4().simple().to_string();

        self.sessions
            .write()
            .await
            .insert(session.clone(), Caller::new(user_id, csrf_token.clone()));

        IssuedSession {
            session,
            csrf_token,
        }
    }

    /// Resolves the `Authorization: Bearer <session>` header to its caller.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Caller, PurchaseError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(PurchaseError::Unauthenticated)?;

        self.sessions
            .read()
            .await
            .get(token.trim())
            .cloned()
            .ok_or(PurchaseError::Unauthenticated)
    }
}
