use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole { System, User, Assistant }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self { Self { role, content: content.into() } }
}

/// One shopper question and the assistant's answer.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub merchant_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl ChatRecord {
    pub fn exchange(user_id: Uuid, merchant_id: Uuid, question: &str, reply: &str) -> Self {
        Self {
            id: Uuid::now_v7(), user_id, merchant_id,
            messages: vec![ChatMessage::new(ChatRole::User, question), ChatMessage::new(ChatRole::Assistant, reply)],
            created_at: Utc::now(),
        }
    }
}
