use serde::{Deserialize, Serialize};

use super::{Message, UserProfile};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: String,
    pub user_one: String,
    pub user_two: String,
    pub created_at: String,
}

impl Conversation {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user_one == user_id || self.user_two == user_id
    }

    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user_one == user_id {
            &self.user_two
        } else {
            &self.user_one
        }
    }
}

/// Canonical key for an unordered pair of users. The lower id is length-prefixed, so ids
/// containing `:` cannot make two pairs collide.
pub fn pair_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}:{}", low.len(), low, high)
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Message,
    pub other_user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
    pub other_user: Option<UserProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_ignores_order() {
        assert_eq!(pair_key("u1", "u2"), pair_key("u2", "u1"));
        assert_eq!(pair_key("b", "a"), "1:a:b");
    }

    #[test]
    fn pair_key_survives_colons_in_ids() {
        assert_ne!(pair_key("a:b", "c"), pair_key("a", "b:c"));
    }
}
