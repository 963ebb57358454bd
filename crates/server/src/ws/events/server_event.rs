use serde::Serialize;

use crate::models::{Conversation, Message};

// ── Server → Client Events ──

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once after activation.
    OnlineUsers {
        #[serde(rename = "userIds")]
        user_ids: Vec<String>,
    },
    /// Acknowledges a `send_message` to the connection that sent it.
    MessageSent {
        #[serde(rename = "tempId", skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
        message: Message,
    },
    NewConversation {
        conversation: Conversation,
        message: Message,
    },
    NewMessage(Message),
    MessageEdited {
        #[serde(rename = "messageId")]
        message_id: String,
        message: String,
        edited_at: Option<String>,
    },
    MessageDeleted {
        #[serde(rename = "messageId")]
        message_id: String,
        both: bool,
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    ConversationDeleted {
        conversation_id: String,
    },
    MessagesRead {
        conversation_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "messageIds")]
        message_ids: Vec<String>,
    },
    /// Single-message receipt.
    MessageRead {
        #[serde(rename = "messageId")]
        message_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    UnreadCount {
        count: i64,
        #[serde(rename = "hasUnread")]
        has_unread: bool,
    },
    Notification(Notification),
    Typing {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    StopTyping {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    UserOnline {
        #[serde(rename = "userId")]
        user_id: String,
        status: String,
    },
    UserOffline {
        #[serde(rename = "userId")]
        user_id: String,
        last_seen: String,
    },
    UserStatusChanged {
        #[serde(rename = "userId")]
        user_id: String,
        status: String,
    },
    RateLimited {
        message: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(rename = "tempId", skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
}

impl ServerEvent {
    pub fn unread_count(count: i64) -> Self {
        ServerEvent::UnreadCount {
            count,
            has_unread: count > 0,
        }
    }
}

/// Pushed to the receiver's personal room for each new message.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub sender_image: Option<String>,
    pub sender_name: String,
    pub message: String,
    pub file_type: String,
    pub conversation_id: String,
    pub message_id: String,
}
