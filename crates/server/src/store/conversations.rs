use super::{ConversationStore, MESSAGE_COLUMNS};
use crate::db::timestamp;
use crate::error::ChatError;
use crate::models::{pair_key, Conversation, ConversationDetail, ConversationSummary, MessageRow};

impl ConversationStore {
    pub async fn find_conversation(&self, conversation_id: &str) -> Result<Conversation, ChatError> {
        sqlx::query_as::<_, Conversation>(
            "SELECT id, user_one, user_two, created_at FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ChatError::NotFound("conversation"))
    }

    pub async fn find_conversation_between(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>, ChatError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"SELECT id, user_one, user_two, created_at FROM conversations
               WHERE (user_one = ? AND user_two = ?) OR (user_one = ? AND user_two = ?)"#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_optional(&self.pool)
        .await?;
        Ok(conversation)
    }

    /// Returns the pair's conversation and whether this call created it.
    ///
    /// Concurrent first contact from both sides is settled by the unique `pair_key`:
    /// every loser of the insert race reads back the winner's row.
    pub async fn find_or_create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<(Conversation, bool), ChatError> {
        if user_a == user_b {
            return Err(ChatError::Validation(
                "Cannot start a conversation with yourself".into(),
            ));
        }

        if let Some(existing) = self.find_conversation_between(user_a, user_b).await? {
            return Ok((existing, false));
        }

        self.find_user(user_b).await?;

        let key = pair_key(user_a, user_b);
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp();

        let inserted = sqlx::query(
            r#"INSERT INTO conversations (id, user_one, user_two, pair_key, created_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(pair_key) DO NOTHING"#,
        )
        .bind(&id)
        .bind(user_a)
        .bind(user_b)
        .bind(&key)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let conversation = sqlx::query_as::<_, Conversation>(
            "SELECT id, user_one, user_two, created_at FROM conversations WHERE pair_key = ?",
        )
        .bind(&key)
        .fetch_one(&self.pool)
        .await?;

        if !(conversation.has_participant(user_a) && conversation.has_participant(user_b)) {
            tracing::error!("Conversation {} does not match pair key {}", conversation.id, key);
            return Err(ChatError::Validation("Conversation pair mismatch".into()));
        }

        if inserted == 1 {
            tracing::debug!("Created conversation {} for {}", conversation.id, key);
        }
        Ok((conversation, inserted == 1))
    }

    /// The subset of `conversation_ids` that `user_id` takes part in.
    pub async fn participant_conversations(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> Result<Vec<String>, ChatError> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<&str> = conversation_ids.iter().map(|_| "?").collect();
        let sql = format!(
            "SELECT id FROM conversations WHERE (user_one = ? OR user_two = ?) AND id IN ({})",
            placeholders.join(",")
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql).bind(user_id).bind(user_id);
        for id in conversation_ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Conversations with at least one message visible to `user_id`, most recent first.
    pub async fn list_conversations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"SELECT id, user_one, user_two, created_at FROM conversations
               WHERE user_one = ? OR user_two = ?"#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let last_visible_sql = format!(
            r#"SELECT {} FROM messages m
               WHERE m.conversation_id = ?
                 AND NOT EXISTS (
                     SELECT 1 FROM message_deletions d
                     WHERE d.message_id = m.id AND d.user_id = ?
                 )
               ORDER BY m.created_at DESC, m.rowid DESC
               LIMIT 1"#,
            MESSAGE_COLUMNS
        );

        let mut summaries = Vec::new();
        for conversation in conversations {
            let row = sqlx::query_as::<_, MessageRow>(&last_visible_sql)
                .bind(&conversation.id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

            let Some(row) = row else { continue };
            let deleted_by = self.deletions_for_message(&row.id).await?;
            let other_user = self
                .find_profile(conversation.other_participant(user_id))
                .await?;

            summaries.push(ConversationSummary {
                conversation,
                last_message: row.into_message(deleted_by),
                other_user,
            });
        }

        summaries.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
        Ok(summaries)
    }

    /// A conversation with the messages `user_id` has not deleted, oldest first.
    pub async fn conversation_detail(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ConversationDetail, ChatError> {
        let conversation = self.find_conversation(conversation_id).await?;
        if !conversation.has_participant(user_id) {
            return Err(ChatError::Forbidden("not a participant of this conversation"));
        }

        let sql = format!(
            r#"SELECT {} FROM messages m
               WHERE m.conversation_id = ?
                 AND NOT EXISTS (
                     SELECT 1 FROM message_deletions d
                     WHERE d.message_id = m.id AND d.user_id = ?
                 )
               ORDER BY m.created_at ASC, m.rowid ASC"#,
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(conversation_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut deletions = self.deletions_for_conversation(conversation_id).await?;
        let messages = rows
            .into_iter()
            .map(|row| {
                let deleted_by = deletions.remove(&row.id).unwrap_or_default();
                row.into_message(deleted_by)
            })
            .collect();

        let other_user = self
            .find_profile(conversation.other_participant(user_id))
            .await?;

        Ok(ConversationDetail {
            conversation,
            messages,
            other_user,
        })
    }

    /// Hide every message of the conversation from `actor`. Returns true when this left
    /// nothing for either side and the conversation was removed.
    pub async fn delete_conversation_for_user(
        &self,
        conversation_id: &str,
        actor: &str,
    ) -> Result<bool, ChatError> {
        let conversation = self.find_conversation(conversation_id).await?;
        if !conversation.has_participant(actor) {
            return Err(ChatError::Forbidden("not a participant of this conversation"));
        }

        sqlx::query(
            r#"INSERT OR IGNORE INTO message_deletions (message_id, user_id)
               SELECT id, ? FROM messages WHERE conversation_id = ?"#,
        )
        .bind(actor)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        self.purge_if_abandoned(&conversation).await
    }

    /// Like `delete_conversation_for_user`, but a conversation without messages is
    /// `NotFound("message")`.
    pub async fn clear_messages_for_user(
        &self,
        conversation_id: &str,
        actor: &str,
    ) -> Result<bool, ChatError> {
        let conversation = self.find_conversation(conversation_id).await?;
        if !conversation.has_participant(actor) {
            return Err(ChatError::Forbidden("not a participant of this conversation"));
        }

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        if count == 0 {
            return Err(ChatError::NotFound("message"));
        }

        self.delete_conversation_for_user(conversation_id, actor).await
    }

    /// Hard delete the conversation and its messages once every message has been
    /// deleted by both participants. An empty conversation is left alone.
    pub(crate) async fn purge_if_abandoned(
        &self,
        conversation: &Conversation,
    ) -> Result<bool, ChatError> {
        let mut tx = self.pool.begin().await?;

        let (total, abandoned) = sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT COUNT(*),
                      COALESCE(SUM(CASE WHEN (
                          SELECT COUNT(*) FROM message_deletions d
                          WHERE d.message_id = m.id AND d.user_id IN (?, ?)
                      ) = 2 THEN 1 ELSE 0 END), 0)
               FROM messages m
               WHERE m.conversation_id = ?"#,
        )
        .bind(&conversation.user_one)
        .bind(&conversation.user_two)
        .bind(&conversation.id)
        .fetch_one(&mut *tx)
        .await?;

        if total == 0 || total != abandoned {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"DELETE FROM message_deletions
               WHERE message_id IN (SELECT id FROM messages WHERE conversation_id = ?)"#,
        )
        .bind(&conversation.id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(&conversation.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(&conversation.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Removed conversation {} deleted by both participants", conversation.id);
        Ok(true)
    }
}
