//! Crop issue endpoints: farmer reports, admin-driven status transitions,
//! and the shared reply thread.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{CropIssue, CropIssueResponse, IssueReply};
use crate::uploads;
use crate::AppState;

use super::auth::{AdminIdentity, CallerIdentity, FarmerIdentity, ROLE_ADMIN};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_issue_severity, validate_issue_status, validate_required};

const MAX_ISSUE_IMAGES: usize = 5;

#[derive(Debug, Serialize)]
pub struct IssueEnvelope {
    pub message: String,
    pub issue: CropIssueResponse,
}

#[derive(Debug, Default)]
struct IssueForm {
    title: String,
    category: String,
    severity: String,
    location: String,
    description: String,
    urgency: bool,
    images: Vec<(String, Vec<u8>)>,
}

impl IssueForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = IssueForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "images" {
                if form.images.len() >= MAX_ISSUE_IMAGES {
                    return Err(ApiError::bad_request("Too many images (max 5)"));
                }
                let filename = field.file_name().unwrap_or("image").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid file upload: {}", e)))?;
                form.images.push((filename, bytes.to_vec()));
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
            match name.as_str() {
                "title" => form.title = value,
                "category" => form.category = value,
                "severity" => form.severity = value,
                "location" => form.location = value,
                "description" => form.description = value,
                "urgency" => form.urgency = value == "true",
                _ => {}
            }
        }

        Ok(form)
    }

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();

        if let Err(e) = validate_required(&self.title, "title") {
            errors.add("title", e);
        }
        if let Err(e) = validate_required(&self.category, "category") {
            errors.add("category", e);
        }
        if let Err(e) = validate_issue_severity(&self.severity) {
            errors.add("severity", e);
        }
        if let Err(e) = validate_required(&self.location, "location") {
            errors.add("location", e);
        }
        if let Err(e) = validate_required(&self.description, "description") {
            errors.add("description", e);
        }

        errors.finish()
    }
}

/// Report a new crop issue (multipart, up to 5 images)
pub async fn create_issue(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<IssueEnvelope>), ApiError> {
    let form = IssueForm::from_multipart(multipart).await?;
    form.validate()?;

    let mut image_urls = Vec::new();
    for (filename, bytes) in &form.images {
        let stored = uploads::store_upload(&state.config.server.upload_dir, "", filename, bytes)
            .await
            .map_err(|e| {
                tracing::error!("Failed to store issue image: {}", e);
                ApiError::internal("Failed to store issue image")
            })?;
        image_urls.push(stored.url);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let images_json = serde_json::to_string(&image_urls)
        .map_err(|_| ApiError::internal("Failed to encode image list"))?;

    sqlx::query(
        r#"
        INSERT INTO crop_issues (
            id, title, category, severity, status, reported_date, location,
            description, urgency, images, farmer_id, replies, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 'open', ?, ?, ?, ?, ?, ?, '[]', ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&form.title)
    .bind(&form.category)
    .bind(&form.severity)
    .bind(&now)
    .bind(&form.location)
    .bind(&form.description)
    .bind(form.urgency)
    .bind(&images_json)
    .bind(&identity.id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let issue = CropIssue::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::internal("Failed to load reported issue"))?;

    Ok((
        StatusCode::CREATED,
        Json(IssueEnvelope {
            message: "Issue reported successfully".to_string(),
            issue: CropIssueResponse::from(issue),
        }),
    ))
}

/// List the authenticated farmer's own issues, newest first
pub async fn my_issues(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<Json<Vec<CropIssueResponse>>, ApiError> {
    let issues = CropIssue::list_for_farmer(&state.db, &identity.id).await?;
    Ok(Json(issues.into_iter().map(CropIssueResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueListQuery {
    pub farmer_id: Option<String>,
}

/// Admin listing of all issues, optionally filtered to one farmer
pub async fn list_issues(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Query(query): Query<IssueListQuery>,
) -> Result<Json<Vec<CropIssueResponse>>, ApiError> {
    let issues: Vec<CropIssue> = match &query.farmer_id {
        Some(farmer_id) => CropIssue::list_for_farmer(&state.db, farmer_id).await?,
        None => {
            sqlx::query_as("SELECT * FROM crop_issues ORDER BY reported_date DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(issues.into_iter().map(CropIssueResponse::from).collect()))
}

/// Fetch one issue with its reply thread. Farmers only see their own;
/// admins see all.
pub async fn get_issue(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<CropIssueResponse>, ApiError> {
    let issue = CropIssue::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Issue not found"))?;

    if caller.role != ROLE_ADMIN && issue.farmer_id.as_deref() != Some(caller.id.as_str()) {
        return Err(ApiError::not_found("Issue not found"));
    }

    Ok(Json(CropIssueResponse::from(issue)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Move an issue to any of the three states; transitions are unordered
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<IssueEnvelope>, ApiError> {
    if let Err(e) = validate_issue_status(&request.status) {
        return Err(ApiError::validation_field("status", e));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE crop_issues SET status = ?, updated_at = ? WHERE id = ?")
        .bind(&request.status)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Issue not found"));
    }

    let issue = CropIssue::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Issue not found"))?;

    Ok(Json(IssueEnvelope {
        message: "Status updated".to_string(),
        issue: CropIssueResponse::from(issue),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

/// Append a reply to an issue, attributed to the caller's role
pub async fn add_reply(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> Result<Json<IssueEnvelope>, ApiError> {
    if let Err(e) = validate_required(&request.message, "message") {
        return Err(ApiError::validation_field("message", e));
    }

    let issue = CropIssue::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Issue not found"))?;

    if caller.role != ROLE_ADMIN && issue.farmer_id.as_deref() != Some(caller.id.as_str()) {
        return Err(ApiError::not_found("Issue not found"));
    }

    let reply = if caller.role == ROLE_ADMIN {
        IssueReply {
            message: request.message,
            sender_type: "admin".to_string(),
            admin_id: Some(caller.id),
            farmer_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    } else {
        IssueReply {
            message: request.message,
            sender_type: "farmer".to_string(),
            admin_id: None,
            farmer_id: Some(caller.id),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    };

    let mut replies = issue.reply_list();
    replies.push(reply);
    let replies_json = serde_json::to_string(&replies)
        .map_err(|_| ApiError::internal("Failed to encode reply thread"))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE crop_issues SET replies = ?, updated_at = ? WHERE id = ?")
        .bind(&replies_json)
        .bind(&now)
        .bind(&issue.id)
        .execute(&state.db)
        .await?;

    let issue = CropIssue::find_by_id(&state.db, &issue.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Issue not found"))?;

    Ok(Json(IssueEnvelope {
        message: "Reply added".to_string(),
        issue: CropIssueResponse::from(issue),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{seed_farmer, test_state};

    async fn insert_issue(db: &crate::DbPool, id: &str, farmer_id: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO crop_issues (
                id, title, category, severity, status, reported_date, location,
                description, urgency, images, farmer_id, replies, created_at, updated_at
            ) VALUES (?, 'Leaf blight', 'Disease', 'high', 'open', ?, 'Ward 4',
                      'Spots on leaves', 0, '[]', ?, '[]', ?, ?)
            "#,
        )
        .bind(id)
        .bind(&now)
        .bind(farmer_id)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    fn admin() -> AdminIdentity {
        AdminIdentity {
            id: "a1".to_string(),
            permissions: vec!["all".to_string()],
        }
    }

    #[tokio::test]
    async fn test_update_status_rejects_unknown_value() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        insert_issue(&state.db, "i1", "f1").await;

        let result = update_status(
            State(state),
            admin(),
            Path("i1".to_string()),
            Json(UpdateStatusRequest {
                status: "closed".to_string(),
            }),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_status_persists_exact_value() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        insert_issue(&state.db, "i1", "f1").await;

        let Json(envelope) = update_status(
            State(state.clone()),
            admin(),
            Path("i1".to_string()),
            Json(UpdateStatusRequest {
                status: "in_progress".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(envelope.issue.status, "in_progress");

        // Backward transition is allowed
        let Json(envelope) = update_status(
            State(state),
            admin(),
            Path("i1".to_string()),
            Json(UpdateStatusRequest {
                status: "open".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(envelope.issue.status, "open");
    }

    #[tokio::test]
    async fn test_farmer_cannot_read_foreign_issue() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        seed_farmer(&state.db, "f2", "two@example.com").await;
        insert_issue(&state.db, "i1", "f1").await;

        let caller = CallerIdentity {
            id: "f2".to_string(),
            role: "farmer".to_string(),
        };
        let result = get_issue(State(state), caller, Path("i1".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reply_attributed_to_caller_role() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;
        insert_issue(&state.db, "i1", "f1").await;

        let caller = CallerIdentity {
            id: "f1".to_string(),
            role: "farmer".to_string(),
        };
        let Json(envelope) = add_reply(
            State(state.clone()),
            caller,
            Path("i1".to_string()),
            Json(ReplyRequest {
                message: "Any update?".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(envelope.issue.replies.len(), 1);
        assert_eq!(envelope.issue.replies[0].sender_type, "farmer");
        assert_eq!(envelope.issue.replies[0].farmer_id.as_deref(), Some("f1"));

        let caller = CallerIdentity {
            id: "a1".to_string(),
            role: "admin".to_string(),
        };
        let Json(envelope) = add_reply(
            State(state),
            caller,
            Path("i1".to_string()),
            Json(ReplyRequest {
                message: "Looking into it".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(envelope.issue.replies.len(), 2);
        assert_eq!(envelope.issue.replies[1].sender_type, "admin");
    }
}
