//! Chat session endpoints. Sessions embed their message list; appends are
//! batched (typically one user message plus one bot reply) and a fresh
//! session takes its title from the first user message it receives.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{
    derive_session_title, ChatMessage, ChatSession, ChatSessionResponse, DEFAULT_SESSION_TITLE,
};
use crate::AppState;

use super::auth::FarmerIdentity;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_message_sender;
use super::MessageResponse;

/// Session listings are capped at the 50 most recently active
const SESSION_LIST_LIMIT: i64 = 50;

/// The legacy flattened history covers the 10 most recent sessions
const HISTORY_SESSION_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct SessionCountResponse {
    pub count: i64,
}

/// Number of sessions owned by the authenticated farmer
pub async fn session_count(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<Json<SessionCountResponse>, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_sessions WHERE farmer_id = ?")
        .bind(&identity.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(SessionCountResponse { count: count.0 }))
}

/// The farmer's sessions, most recently active first
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<Json<Vec<ChatSessionResponse>>, ApiError> {
    let sessions =
        ChatSession::recent_for_farmer(&state.db, &identity.id, SESSION_LIST_LIMIT).await?;
    Ok(Json(
        sessions.into_iter().map(ChatSessionResponse::from).collect(),
    ))
}

/// Create an empty session with the placeholder title
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<(StatusCode, Json<ChatSessionResponse>), ApiError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO chat_sessions (
            id, farmer_id, title, messages, last_message_at, message_count,
            created_at, updated_at
        ) VALUES (?, ?, ?, '[]', ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&identity.id)
    .bind(DEFAULT_SESSION_TITLE)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let session = ChatSession::find_owned(&state.db, &id, &identity.id)
        .await?
        .ok_or_else(|| ApiError::internal("Failed to load created session"))?;

    Ok((StatusCode::CREATED, Json(ChatSessionResponse::from(session))))
}

/// Messages of one owned session
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let session = ChatSession::find_owned(&state.db, &session_id, &identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok(Json(session.message_list()))
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub text: String,
    pub sender: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AppendMessagesRequest {
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Serialize)]
pub struct AppendMessagesResponse {
    pub messages: Vec<ChatMessage>,
    pub session: ChatSessionResponse,
}

/// Append a batch of messages to an owned session. Updates the activity
/// timestamp and count, and titles a fresh session from its first user
/// message.
pub async fn append_messages(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(session_id): Path<String>,
    Json(request): Json<AppendMessagesRequest>,
) -> Result<(StatusCode, Json<AppendMessagesResponse>), ApiError> {
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("Messages array is required"));
    }

    let mut errors = ValidationErrorBuilder::new();
    for (index, message) in request.messages.iter().enumerate() {
        if message.text.is_empty() {
            errors.add(format!("messages[{}].text", index), "Text is required");
        }
        if let Err(e) = validate_message_sender(&message.sender) {
            errors.add(format!("messages[{}].sender", index), e);
        }
    }
    errors.finish()?;

    let session = ChatSession::find_owned(&state.db, &session_id, &identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    let now = chrono::Utc::now().to_rfc3339();
    let new_messages: Vec<ChatMessage> = request
        .messages
        .iter()
        .map(|m| ChatMessage {
            text: m.text.clone(),
            sender: m.sender.clone(),
            timestamp: m.timestamp.clone().unwrap_or_else(|| now.clone()),
        })
        .collect();

    let mut all_messages = session.message_list();
    all_messages.extend(new_messages.iter().cloned());

    let title = if session.title == DEFAULT_SESSION_TITLE {
        match new_messages.iter().find(|m| m.sender == "user") {
            Some(first_user) => derive_session_title(&first_user.text),
            None => session.title.clone(),
        }
    } else {
        session.title.clone()
    };

    let messages_json = serde_json::to_string(&all_messages)
        .map_err(|_| ApiError::internal("Failed to encode message list"))?;

    sqlx::query(
        r#"
        UPDATE chat_sessions SET
            messages = ?,
            message_count = ?,
            last_message_at = ?,
            title = ?,
            updated_at = ?
        WHERE id = ? AND farmer_id = ?
        "#,
    )
    .bind(&messages_json)
    .bind(all_messages.len() as i64)
    .bind(&now)
    .bind(&title)
    .bind(&now)
    .bind(&session.id)
    .bind(&identity.id)
    .execute(&state.db)
    .await?;

    let session = ChatSession::find_owned(&state.db, &session.id, &identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok((
        StatusCode::CREATED,
        Json(AppendMessagesResponse {
            messages: new_messages,
            session: ChatSessionResponse::from(session),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

/// Rename an owned session
pub async fn update_title(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(session_id): Path<String>,
    Json(request): Json<UpdateTitleRequest>,
) -> Result<Json<ChatSessionResponse>, ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE chat_sessions SET title = ?, updated_at = ? WHERE id = ? AND farmer_id = ?",
    )
    .bind(&request.title)
    .bind(&now)
    .bind(&session_id)
    .bind(&identity.id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Session not found"));
    }

    let session = ChatSession::find_owned(&state.db, &session_id, &identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok(Json(ChatSessionResponse::from(session)))
}

/// Delete an owned session; its embedded messages go with it
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(session_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ? AND farmer_id = ?")
        .bind(&session_id)
        .bind(&identity.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Session not found"));
    }

    Ok(Json(MessageResponse::new("Session deleted successfully")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub text: String,
    pub sender: String,
    pub timestamp: String,
    pub session_id: String,
}

/// Legacy aggregate history: the messages of the most recent sessions
/// flattened into one list, each tagged with its originating session
pub async fn history(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<Json<Vec<HistoryMessage>>, ApiError> {
    let sessions =
        ChatSession::recent_for_farmer(&state.db, &identity.id, HISTORY_SESSION_LIMIT).await?;

    let messages: Vec<HistoryMessage> = sessions
        .iter()
        .flat_map(|session| {
            session.message_list().into_iter().map(|m| HistoryMessage {
                text: m.text,
                sender: m.sender,
                timestamp: m.timestamp,
                session_id: session.id.clone(),
            })
        })
        .collect();

    Ok(Json(messages))
}

/// Remove every session owned by the authenticated farmer
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<Json<MessageResponse>, ApiError> {
    sqlx::query("DELETE FROM chat_sessions WHERE farmer_id = ?")
        .bind(&identity.id)
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse::new(
        "All chat history cleared successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{seed_farmer, test_state};

    fn farmer(id: &str) -> FarmerIdentity {
        FarmerIdentity { id: id.to_string() }
    }

    async fn new_session(state: &Arc<AppState>, farmer_id: &str) -> String {
        let (_, Json(session)) = create_session(State(state.clone()), farmer(farmer_id))
            .await
            .unwrap();
        session.id
    }

    fn batch(messages: &[(&str, &str)]) -> AppendMessagesRequest {
        AppendMessagesRequest {
            messages: messages
                .iter()
                .map(|(text, sender)| IncomingMessage {
                    text: text.to_string(),
                    sender: sender.to_string(),
                    timestamp: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_append_titles_fresh_session_from_user_message() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        let session_id = new_session(&state, "f1").await;

        let text = "Hello, I need help with my tomato plants showing yellow leaves and spots";
        let (_, Json(response)) = append_messages(
            State(state),
            farmer("f1"),
            Path(session_id),
            Json(batch(&[(text, "user"), ("Let me help with that", "bot")])),
        )
        .await
        .unwrap();

        let expected: String = text.chars().take(50).collect();
        assert_eq!(response.session.title, format!("{}...", expected));
        assert_eq!(response.session.message_count, 2);
        assert_eq!(response.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_append_keeps_customized_title() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        let session_id = new_session(&state, "f1").await;

        update_title(
            State(state.clone()),
            farmer("f1"),
            Path(session_id.clone()),
            Json(UpdateTitleRequest {
                title: "Tomato troubles".to_string(),
            }),
        )
        .await
        .unwrap();

        let (_, Json(response)) = append_messages(
            State(state),
            farmer("f1"),
            Path(session_id),
            Json(batch(&[("A very long question about paddy irrigation and drainage", "user")])),
        )
        .await
        .unwrap();

        assert_eq!(response.session.title, "Tomato troubles");
    }

    #[tokio::test]
    async fn test_append_bot_only_batch_keeps_placeholder_title() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        let session_id = new_session(&state, "f1").await;

        let (_, Json(response)) = append_messages(
            State(state),
            farmer("f1"),
            Path(session_id),
            Json(batch(&[("Welcome back!", "bot")])),
        )
        .await
        .unwrap();

        assert_eq!(response.session.title, DEFAULT_SESSION_TITLE);
    }

    #[tokio::test]
    async fn test_append_rejects_empty_batch_and_bad_sender() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        let session_id = new_session(&state, "f1").await;

        let result = append_messages(
            State(state.clone()),
            farmer("f1"),
            Path(session_id.clone()),
            Json(AppendMessagesRequest { messages: vec![] }),
        )
        .await;
        assert!(result.is_err());

        let result = append_messages(
            State(state),
            farmer("f1"),
            Path(session_id),
            Json(batch(&[("hi", "admin")])),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_foreign_session_is_not_found() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        seed_farmer(&state.db, "f2", "two@example.com").await;
        let session_id = new_session(&state, "f1").await;

        let result = get_messages(
            State(state.clone()),
            farmer("f2"),
            Path(session_id.clone()),
        )
        .await;
        assert!(result.is_err());

        let result = delete_session(State(state), farmer("f2"), Path(session_id)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_history_flattens_and_tags_sessions() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;

        let first = new_session(&state, "f1").await;
        let second = new_session(&state, "f1").await;

        append_messages(
            State(state.clone()),
            farmer("f1"),
            Path(first.clone()),
            Json(batch(&[("About rice", "user")])),
        )
        .await
        .unwrap();
        append_messages(
            State(state.clone()),
            farmer("f1"),
            Path(second.clone()),
            Json(batch(&[("About wheat", "user")])),
        )
        .await
        .unwrap();

        let Json(messages) = history(State(state), farmer("f1")).await.unwrap();
        assert_eq!(messages.len(), 2);
        let session_ids: Vec<&str> = messages.iter().map(|m| m.session_id.as_str()).collect();
        assert!(session_ids.contains(&first.as_str()));
        assert!(session_ids.contains(&second.as_str()));
    }

    #[tokio::test]
    async fn test_clear_history_scoped_to_owner() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        seed_farmer(&state.db, "f2", "two@example.com").await;
        new_session(&state, "f1").await;
        new_session(&state, "f2").await;

        clear_history(State(state.clone()), farmer("f1")).await.unwrap();

        let Json(own) = session_count(State(state.clone()), farmer("f1")).await.unwrap();
        assert_eq!(own.count, 0);
        let Json(other) = session_count(State(state), farmer("f2")).await.unwrap();
        assert_eq!(other.count, 1);
    }
}
