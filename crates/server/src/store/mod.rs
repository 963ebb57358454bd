mod conversations;
mod messages;
mod users;

pub use messages::DeleteOutcome;

use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use crate::error::ChatError;

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.sender_id, m.receiver_id, m.body, \
     m.message_type, m.file_url, m.file_name, m.file_extension, m.file_size, m.is_read, \
     m.reply_to, m.created_at, m.edited_at";

const USER_COLUMNS: &str = "id, name, handle, avatar, role, status, last_seen, notifications_enabled";

const PROFILE_COLUMNS: &str = "id, name, handle, avatar, status, last_seen";

/// Conversation, message and user operations against one tenant's store.
#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// message_id -> users who deleted it, for every message of a conversation.
    async fn deletions_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<HashMap<String, HashSet<String>>, ChatError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"SELECT d.message_id, d.user_id
               FROM message_deletions d
               JOIN messages m ON m.id = d.message_id
               WHERE m.conversation_id = ?"#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut map: HashMap<String, HashSet<String>> = HashMap::new();
        for (message_id, user_id) in rows {
            map.entry(message_id).or_default().insert(user_id);
        }
        Ok(map)
    }

    async fn deletions_for_message(&self, message_id: &str) -> Result<HashSet<String>, ChatError> {
        let users = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM message_deletions WHERE message_id = ?",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users.into_iter().collect())
    }
}
