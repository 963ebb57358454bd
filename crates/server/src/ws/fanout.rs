use std::path::{Path, PathBuf};

use crate::models::{Attachment, Message};
use crate::store::DeleteOutcome;
use crate::ws::events::ServerEvent;
use crate::ws::gateway::{GatewayState, Room};

/// Events that follow a store write, shared by socket handlers and HTTP routes.
pub struct Fanout<'a> {
    gateway: &'a GatewayState,
    tenant: &'a str,
}

impl<'a> Fanout<'a> {
    pub fn new(gateway: &'a GatewayState, tenant: &'a str) -> Self {
        Self { gateway, tenant }
    }

    async fn to_conversation(&self, conversation_id: &str, event: &ServerEvent) {
        self.gateway
            .broadcast_room(
                self.tenant,
                &Room::Conversation(conversation_id.to_string()),
                event,
                None,
            )
            .await;
    }

    pub async fn message_edited(&self, message: &Message) {
        self.to_conversation(
            &message.conversation_id,
            &ServerEvent::MessageEdited {
                message_id: message.id.clone(),
                message: message.body.clone(),
                edited_at: message.edited_at.clone(),
            },
        )
        .await;
    }

    /// `message_deleted`, then `conversation_deleted` if the delete purged it. An unsent
    /// attachment's file is removed from `upload_dir`.
    pub async fn message_deleted(&self, actor: &str, outcome: &DeleteOutcome, upload_dir: &str) {
        self.to_conversation(
            &outcome.conversation_id,
            &ServerEvent::MessageDeleted {
                message_id: outcome.message_id.clone(),
                both: outcome.both_sides_removed,
                user_id: (!outcome.both_sides_removed).then(|| actor.to_string()),
            },
        )
        .await;

        if let Some(attachment) = &outcome.attachment {
            discard_upload(upload_dir, attachment).await;
        }

        if outcome.conversation_removed {
            self.conversation_deleted(&outcome.conversation_id).await;
        }
    }

    pub async fn conversation_deleted(&self, conversation_id: &str) {
        self.to_conversation(
            conversation_id,
            &ServerEvent::ConversationDeleted {
                conversation_id: conversation_id.to_string(),
            },
        )
        .await;
    }

    /// Bulk receipt; nothing is sent when no message changed.
    pub async fn messages_read(&self, conversation_id: &str, reader: &str, message_ids: Vec<String>) {
        if message_ids.is_empty() {
            return;
        }
        self.to_conversation(
            conversation_id,
            &ServerEvent::MessagesRead {
                conversation_id: conversation_id.to_string(),
                user_id: reader.to_string(),
                message_ids,
            },
        )
        .await;
    }

    pub async fn message_read(&self, message: &Message, reader: &str) {
        self.to_conversation(
            &message.conversation_id,
            &ServerEvent::MessageRead {
                message_id: message.id.clone(),
                user_id: reader.to_string(),
            },
        )
        .await;
    }

    pub async fn unread_count(&self, user_id: &str, count: i64) {
        self.gateway
            .broadcast_room(
                self.tenant,
                &Room::User(user_id.to_string()),
                &ServerEvent::unread_count(count),
                None,
            )
            .await;
    }

    pub async fn status_changed(&self, user_id: &str, status: &str) {
        self.gateway
            .broadcast_tenant(
                self.tenant,
                &ServerEvent::UserStatusChanged {
                    user_id: user_id.to_string(),
                    status: status.to_string(),
                },
                None,
            )
            .await;
    }
}

/// Removes the uploaded file behind an unsent attachment. Only files under the
/// upload directory are touched.
async fn discard_upload(upload_dir: &str, attachment: &Attachment) {
    let Some(path) = upload_path(upload_dir, &attachment.url) else {
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!("Discarded upload {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to discard upload {}: {}", path.display(), e),
    }
}

fn upload_path(upload_dir: &str, url: &str) -> Option<PathBuf> {
    let (_, name) = url.rsplit_once("/uploads/")?;
    let name = name.split(['?', '#']).next()?;
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return None;
    }
    Some(Path::new(upload_dir).join(name))
}
