mod server_event;

pub use server_event::{Notification, ServerEvent};

use serde::Deserialize;

// ── Client → Server Events ──

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        #[serde(default, rename = "conversationIds")]
        conversation_ids: Vec<String>,
    },
    Leave {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    Typing {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    StopTyping {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    SendMessage(SendMessage),
    EditMessage {
        #[serde(rename = "messageId")]
        message_id: String,
        message: String,
    },
    DeleteMessage {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    /// Either a whole conversation or a single message.
    MarkRead {
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default, rename = "messageId")]
        message_id: Option<String>,
    },
    ChangeStatus {
        status: String,
    },
    Ping,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessage {
    pub receiver_id: String,
    #[serde(default)]
    pub message: String,
    pub message_type: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_extension: Option<String>,
    pub file_size: Option<i64>,
    /// Id of the message being replied to.
    pub reply: Option<String>,
    #[serde(rename = "tempId")]
    pub temp_id: Option<String>,
}
