use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    File,
    Audio,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::File => "file",
            MessageType::Audio => "audio",
        }
    }

    /// Best guess from a file extension when the client did not say.
    pub fn infer(extension: Option<&str>) -> Self {
        let ext = extension
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" | "heic" => MessageType::Image,
            "mp4" | "mov" | "webm" | "mkv" | "avi" => MessageType::Video,
            "mp3" | "wav" | "ogg" | "m4a" | "aac" | "flac" | "opus" => MessageType::Audio,
            _ => MessageType::File,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "video" => Ok(MessageType::Video),
            "file" => Ok(MessageType::File),
            "audio" => Ok(MessageType::Audio),
            other => Err(format!("Invalid message type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: Option<String>,
    pub extension: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "message_type")]
    pub kind: MessageType,
    pub attachment: Option<Attachment>,
    pub is_read: bool,
    pub deleted_by: HashSet<String>,
    pub reply_to: Option<String>,
    pub created_at: String,
    pub edited_at: Option<String>,
}

impl Message {
    pub fn is_deleted_by(&self, user_id: &str) -> bool {
        self.deleted_by.contains(user_id)
    }
}

/// Flat row as stored; `deleted_by` lives in `message_deletions`.
#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub message_type: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_extension: Option<String>,
    pub file_size: Option<i64>,
    pub is_read: bool,
    pub reply_to: Option<String>,
    pub created_at: String,
    pub edited_at: Option<String>,
}

impl MessageRow {
    pub fn into_message(self, deleted_by: HashSet<String>) -> Message {
        let attachment = self.file_url.map(|url| Attachment {
            url,
            name: self.file_name,
            extension: self.file_extension,
            size: self.file_size,
        });
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            body: self.body,
            kind: self.message_type.parse().unwrap_or(MessageType::Text),
            attachment,
            is_read: self.is_read,
            deleted_by,
            reply_to: self.reply_to,
            created_at: self.created_at,
            edited_at: self.edited_at,
        }
    }
}

/// Input to `ConversationStore::create_message`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub kind: MessageType,
    pub attachment: Option<Attachment>,
    pub reply_to: Option<String>,
}
