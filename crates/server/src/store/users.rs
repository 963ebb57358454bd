use super::{ConversationStore, PROFILE_COLUMNS, USER_COLUMNS};
use crate::error::ChatError;
use crate::models::{User, UserProfile, UserStatus};

impl ConversationStore {
    pub async fn find_user(&self, user_id: &str) -> Result<User, ChatError> {
        let sql = format!(r#"SELECT {} FROM "users" WHERE id = ?"#, USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ChatError::NotFound("user"))
    }

    pub async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ChatError> {
        let sql = format!(r#"SELECT {} FROM "users" WHERE id = ?"#, PROFILE_COLUMNS);
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn user_by_token(&self, token: &str) -> Result<Option<User>, ChatError> {
        let sql = format!(r#"SELECT {} FROM "users" WHERE token = ?"#, USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users_except(&self, user_id: &str) -> Result<Vec<UserProfile>, ChatError> {
        let sql = format!(
            r#"SELECT {} FROM "users" WHERE id <> ? ORDER BY name"#,
            PROFILE_COLUMNS
        );
        let users = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn set_status(&self, user_id: &str, status: UserStatus) -> Result<(), ChatError> {
        let result = sqlx::query(r#"UPDATE "users" SET status = ? WHERE id = ?"#)
            .bind(status.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ChatError::NotFound("user"));
        }
        Ok(())
    }

    /// First live connection. A chosen status (busy, away) survives; last_seen is untouched.
    pub async fn mark_online(&self, user_id: &str) -> Result<(), ChatError> {
        sqlx::query(r#"UPDATE "users" SET status = 'online' WHERE id = ? AND status = 'offline'"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Last live connection closed.
    pub async fn mark_offline(&self, user_id: &str, at: &str) -> Result<(), ChatError> {
        sqlx::query(r#"UPDATE "users" SET status = 'offline', last_seen = ? WHERE id = ?"#)
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
