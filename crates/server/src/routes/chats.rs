use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use parley_shared::validation::validate_message_content;

use crate::error::ChatError;
use crate::middleware::auth::TenantUser;
use crate::ws::fanout::Fanout;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub receiver_id: String,
}

/// GET /api/chats
pub async fn list_chats(auth: TenantUser) -> Result<impl IntoResponse, ChatError> {
    let summaries = auth
        .tenant
        .conversations()
        .list_conversations_for_user(&auth.user.id)
        .await?;
    Ok(Json(summaries))
}

/// GET /api/chats/{conversationId}
pub async fn get_chat(
    auth: TenantUser,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let detail = auth
        .tenant
        .conversations()
        .conversation_detail(&conversation_id, &auth.user.id)
        .await?;
    Ok(Json(detail))
}

/// POST /api/chats
pub async fn create_chat(
    auth: TenantUser,
    Json(body): Json<CreateChatRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let (conversation, created) = auth
        .tenant
        .conversations()
        .find_or_create_conversation(&auth.user.id, body.receiver_id.trim())
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(serde_json::json!({
            "conversation": conversation,
            "created": created,
        })),
    ))
}

/// DELETE /api/chats/{conversationId}
///
/// Hides the conversation from the caller. Live clients in the room hear about it
/// only when both sides have deleted it.
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    auth: TenantUser,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let removed = auth
        .tenant
        .conversations()
        .delete_conversation_for_user(&conversation_id, &auth.user.id)
        .await?;

    if removed {
        Fanout::new(&state.gateway, &auth.tenant.key)
            .conversation_deleted(&conversation_id)
            .await;
    }

    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// DELETE /api/chats/{conversationId}/messages
///
/// Same as deleting the chat, but 404 when it has no messages at all.
pub async fn clear_messages(
    State(state): State<Arc<AppState>>,
    auth: TenantUser,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let removed = auth
        .tenant
        .conversations()
        .clear_messages_for_user(&conversation_id, &auth.user.id)
        .await?;

    if removed {
        Fanout::new(&state.gateway, &auth.tenant.key)
            .conversation_deleted(&conversation_id)
            .await;
    }

    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub message: String,
}

/// PATCH /api/chats/messages/{messageId}
pub async fn edit_message(
    State(state): State<Arc<AppState>>,
    auth: TenantUser,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ChatError> {
    validate_message_content(&body.message, false).map_err(ChatError::Validation)?;

    let message = auth
        .tenant
        .conversations()
        .edit_message(&message_id, &auth.user.id, &body.message)
        .await?;

    Fanout::new(&state.gateway, &auth.tenant.key)
        .message_edited(&message)
        .await;
    Ok(Json(message))
}

/// DELETE /api/chats/messages/{messageId}
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    auth: TenantUser,
    Path(message_id): Path<String>,
) -> Result<impl IntoResponse, ChatError> {
    let outcome = auth
        .tenant
        .conversations()
        .delete_message(&message_id, &auth.user.id)
        .await?;

    Fanout::new(&state.gateway, &auth.tenant.key)
        .message_deleted(&auth.user.id, &outcome, &state.config.upload_dir)
        .await;

    Ok(Json(serde_json::json!({
        "both": outcome.both_sides_removed,
        "conversation_removed": outcome.conversation_removed,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(alias = "conversationId")]
    pub conversation_id: String,
}

/// PUT /api/chats/messages/mark-read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: TenantUser,
    Json(body): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ChatError> {
    let store = auth.tenant.conversations();
    let reader = &auth.user.id;
    let message_ids = store.mark_read(&body.conversation_id, reader).await?;
    let unread = store.unread_count(reader).await?;

    let fanout = Fanout::new(&state.gateway, &auth.tenant.key);
    fanout
        .messages_read(&body.conversation_id, reader, message_ids.clone())
        .await;
    fanout.unread_count(reader, unread).await;

    Ok(Json(serde_json::json!({ "messageIds": message_ids })))
}
