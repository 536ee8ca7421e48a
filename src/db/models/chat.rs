//! Chat session model. A session embeds its ordered message list as a JSON
//! column; messages are appended in batches and never edited.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::DbPool;

/// Placeholder title given to fresh sessions until the first user message
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

pub const MESSAGE_SENDERS: [&str; 2] = ["user", "bot"];

/// Titles derived from a user message are capped at this many characters
const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSession {
    pub id: String,
    pub farmer_id: String,
    pub title: String,
    pub messages: String, // JSON array of ChatMessage
    pub last_message_at: String,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: String,
    pub timestamp: String,
}

impl ChatSession {
    /// Fetch a session only if it belongs to the given farmer
    pub async fn find_owned(
        db: &DbPool,
        id: &str,
        farmer_id: &str,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM chat_sessions WHERE id = ? AND farmer_id = ?")
            .bind(id)
            .bind(farmer_id)
            .fetch_optional(db)
            .await
    }

    pub async fn recent_for_farmer(
        db: &DbPool,
        farmer_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatSession>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM chat_sessions WHERE farmer_id = ? ORDER BY last_message_at DESC LIMIT ?",
        )
        .bind(farmer_id)
        .bind(limit)
        .fetch_all(db)
        .await
    }

    pub fn message_list(&self) -> Vec<ChatMessage> {
        serde_json::from_str(&self.messages).unwrap_or_default()
    }
}

/// Derive a session title from the first user message: the text capped at 50
/// characters, with a trailing ellipsis marker when truncated.
pub fn derive_session_title(text: &str) -> String {
    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    if text.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionResponse {
    pub id: String,
    pub farmer_id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub last_message_at: String,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ChatSession> for ChatSessionResponse {
    fn from(session: ChatSession) -> Self {
        let messages = session.message_list();
        Self {
            id: session.id,
            farmer_id: session.farmer_id,
            title: session.title,
            messages,
            last_message_at: session.last_message_at,
            message_count: session.message_count,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_used_verbatim() {
        assert_eq!(derive_session_title("Aphids on my maize"), "Aphids on my maize");
    }

    #[test]
    fn test_long_message_truncated_with_ellipsis() {
        let text = "Hello, I need help with my tomato plants showing yellow leaves and spots";
        let title = derive_session_title(text);
        let expected: String = text.chars().take(50).collect();
        assert_eq!(title, format!("{}...", expected));
        assert_eq!(title.chars().count(), 53);
    }

    #[test]
    fn test_exactly_fifty_chars_not_truncated() {
        let text: String = std::iter::repeat('x').take(50).collect();
        assert_eq!(derive_session_title(&text), text);
    }

    #[test]
    fn test_truncation_respects_multibyte_boundaries() {
        let text: String = std::iter::repeat('ध').take(60).collect();
        let title = derive_session_title(&text);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
    }
}
