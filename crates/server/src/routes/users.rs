use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ChatError;
use crate::middleware::auth::TenantUser;
use crate::models::UserStatus;
use crate::ws::fanout::Fanout;
use crate::AppState;

/// GET /api/users
pub async fn list_users(auth: TenantUser) -> Result<impl IntoResponse, ChatError> {
    let users = auth
        .tenant
        .conversations()
        .list_users_except(&auth.user.id)
        .await?;
    Ok(Json(users))
}

/// GET /api/users/me
pub async fn get_me(auth: TenantUser) -> impl IntoResponse {
    Json(auth.user)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// PATCH /api/users/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    auth: TenantUser,
    Json(body): Json<StatusRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let status: UserStatus = body
        .status
        .parse()
        .map_err(|_| ChatError::InvalidStatus(body.status.clone()))?;

    let store = auth.tenant.conversations();
    store.set_status(&auth.user.id, status).await?;

    Fanout::new(&state.gateway, &auth.tenant.key)
        .status_changed(&auth.user.id, status.as_str())
        .await;

    Ok(Json(store.find_user(&auth.user.id).await?))
}
