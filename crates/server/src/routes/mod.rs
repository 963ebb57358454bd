pub mod chats;
pub mod users;

use crate::middleware::auth::LenientTenant;
use crate::ws;
use crate::AppState;
use axum::{
    response::IntoResponse,
    routing::{delete, get, patch, put},
    Json, Router,
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Conversations
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route(
            "/chats/{conversationId}",
            get(chats::get_chat).delete(chats::delete_chat),
        )
        .route("/chats/{conversationId}/messages", delete(chats::clear_messages))
        // Messages
        .route("/chats/messages/mark-read", put(chats::mark_read))
        .route(
            "/chats/messages/{messageId}",
            patch(chats::edit_message).delete(chats::delete_message),
        )
        // Users
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::get_me))
        .route("/users/status", patch(users::update_status));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .route("/gateway", get(ws::handler::ws_handler))
        .with_state(state)
}

/// GET /health
async fn health(LenientTenant(tenant): LenientTenant) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "tenant": tenant.key,
    }))
}
