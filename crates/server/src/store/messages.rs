use super::{ConversationStore, MESSAGE_COLUMNS};
use crate::db::timestamp;
use crate::error::ChatError;
use crate::models::{Attachment, Message, MessageRow, NewMessage};

/// What a delete did, for fan-out.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub message_id: String,
    pub conversation_id: String,
    /// The message was physically removed (unsend).
    pub both_sides_removed: bool,
    /// The whole conversation went with it.
    pub conversation_removed: bool,
    /// Attachment of a physically removed message.
    pub attachment: Option<Attachment>,
}

impl ConversationStore {
    pub async fn find_message(&self, message_id: &str) -> Result<Message, ChatError> {
        let sql = format!("SELECT {} FROM messages m WHERE m.id = ?", MESSAGE_COLUMNS);
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ChatError::NotFound("message"))?;

        let deleted_by = self.deletions_for_message(&row.id).await?;
        Ok(row.into_message(deleted_by))
    }

    pub async fn create_message(&self, new: NewMessage) -> Result<Message, ChatError> {
        if let Some(reply_to) = &new.reply_to {
            let parent = sqlx::query_scalar::<_, String>(
                "SELECT id FROM messages WHERE id = ? AND conversation_id = ?",
            )
            .bind(reply_to)
            .bind(&new.conversation_id)
            .fetch_optional(&self.pool)
            .await?;
            if parent.is_none() {
                return Err(ChatError::NotFound("message"));
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();
        let attachment = new.attachment.as_ref();

        sqlx::query(
            r#"INSERT INTO messages
               (id, conversation_id, sender_id, receiver_id, body, message_type,
                file_url, file_name, file_extension, file_size, is_read, reply_to, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(&id)
        .bind(&new.conversation_id)
        .bind(&new.sender_id)
        .bind(&new.receiver_id)
        .bind(&new.body)
        .bind(new.kind.as_str())
        .bind(attachment.map(|a| a.url.as_str()))
        .bind(attachment.and_then(|a| a.name.as_deref()))
        .bind(attachment.and_then(|a| a.extension.as_deref()))
        .bind(attachment.and_then(|a| a.size))
        .bind(&new.reply_to)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id,
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            body: new.body,
            kind: new.kind,
            attachment: new.attachment,
            is_read: false,
            deleted_by: Default::default(),
            reply_to: new.reply_to,
            created_at: now,
            edited_at: None,
        })
    }

    /// Rewrites the body. Sender and deletion rules are checked by the UPDATE itself, so
    /// a delete landing just before it cannot be edited over; the message is only read
    /// afterwards to report why nothing changed.
    pub async fn edit_message(
        &self,
        message_id: &str,
        editor: &str,
        body: &str,
    ) -> Result<Message, ChatError> {
        let now = timestamp();
        let updated = sqlx::query(
            r#"UPDATE messages SET body = ?, edited_at = ?
               WHERE id = ? AND sender_id = ?
                 AND NOT EXISTS (
                     SELECT 1 FROM message_deletions d
                     WHERE d.message_id = messages.id AND d.user_id = ?
                 )"#,
        )
        .bind(body)
        .bind(&now)
        .bind(message_id)
        .bind(editor)
        .bind(editor)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let message = self.find_message(message_id).await?;
        if updated == 0 {
            if message.sender_id != editor {
                return Err(ChatError::Forbidden("only the sender can edit a message"));
            }
            return Err(ChatError::AlreadyDeleted);
        }
        Ok(message)
    }

    /// Unsend when the sender deletes an unread message, otherwise hide it from `actor`.
    pub async fn delete_message(
        &self,
        message_id: &str,
        actor: &str,
    ) -> Result<DeleteOutcome, ChatError> {
        let message = self.find_message(message_id).await?;
        let conversation = self.find_conversation(&message.conversation_id).await?;
        if !conversation.has_participant(actor) {
            return Err(ChatError::Forbidden("not a participant of this conversation"));
        }

        let mut both_sides_removed = false;
        if message.sender_id == actor && !message.is_read {
            // The read flag is re-checked in the statement; a receiver marking it read in
            // between turns this into a one-sided delete.
            let removed = sqlx::query("DELETE FROM messages WHERE id = ? AND is_read = 0")
                .bind(message_id)
                .execute(&self.pool)
                .await?
                .rows_affected();
            both_sides_removed = removed == 1;
        }

        if !both_sides_removed {
            sqlx::query(
                "INSERT OR IGNORE INTO message_deletions (message_id, user_id) VALUES (?, ?)",
            )
            .bind(message_id)
            .bind(actor)
            .execute(&self.pool)
            .await?;
        }

        let conversation_removed = self.purge_if_abandoned(&conversation).await?;

        Ok(DeleteOutcome {
            message_id: message.id,
            conversation_id: message.conversation_id,
            both_sides_removed,
            conversation_removed,
            attachment: if both_sides_removed {
                message.attachment
            } else {
                None
            },
        })
    }

    /// Marks everything addressed to `receiver` in the conversation as read.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        receiver: &str,
    ) -> Result<Vec<String>, ChatError> {
        self.find_conversation(conversation_id).await?;

        let ids = sqlx::query_scalar::<_, String>(
            r#"UPDATE messages SET is_read = 1
               WHERE conversation_id = ? AND receiver_id = ? AND is_read = 0
               RETURNING id"#,
        )
        .bind(conversation_id)
        .bind(receiver)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Marks one message read. Only its receiver may do so; returns whether this call
    /// flipped it.
    pub async fn mark_message_read(
        &self,
        message_id: &str,
        receiver: &str,
    ) -> Result<(Message, bool), ChatError> {
        let mut message = self.find_message(message_id).await?;
        if message.receiver_id != receiver {
            return Err(ChatError::Forbidden("only the receiver can mark a message read"));
        }

        let flipped = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(message_id)
        .bind(receiver)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        message.is_read = true;
        Ok((message, flipped))
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<i64, ChatError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM messages m
               WHERE m.receiver_id = ? AND m.is_read = 0
                 AND NOT EXISTS (
                     SELECT 1 FROM message_deletions d
                     WHERE d.message_id = m.id AND d.user_id = ?
                 )"#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
