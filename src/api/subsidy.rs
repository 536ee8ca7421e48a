//! Subsidy endpoints: application submission with document uploads, the
//! admin review workflow (status, replies), and ongoing-subsidy
//! announcements.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{
    OngoingSubsidy, SubsidyApplication, SubsidyApplicationResponse, DOCUMENT_FIELDS,
};
use crate::uploads;
use crate::AppState;

use super::auth::{AdminIdentity, CallerIdentity, FarmerIdentity, ROLE_ADMIN};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_required, validate_subsidy_status};
use super::MessageResponse;

#[derive(Debug, Serialize)]
pub struct ApplicationEnvelope {
    pub message: String,
    pub application: SubsidyApplicationResponse,
}

#[derive(Debug, Default)]
struct ApplicationForm {
    subsidy_type: String,
    crop_type: String,
    farm_area: String,
    expected_amount: String,
    purpose: String,
    description: String,
    contact_number: String,
    documents: HashMap<String, (String, Vec<u8>)>,
}

impl ApplicationForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ApplicationForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if DOCUMENT_FIELDS.contains(&name.as_str()) {
                let filename = field.file_name().unwrap_or("document").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid file upload: {}", e)))?;
                form.documents.insert(name, (filename, bytes.to_vec()));
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
            match name.as_str() {
                "subsidyType" => form.subsidy_type = value,
                "cropType" => form.crop_type = value,
                "farmArea" => form.farm_area = value,
                "expectedAmount" => form.expected_amount = value,
                "purpose" => form.purpose = value,
                "description" => form.description = value,
                "contactNumber" => form.contact_number = value,
                _ => {}
            }
        }

        Ok(form)
    }

    /// All seven scalar fields are required; the numeric ones must parse.
    /// Runs before any file is persisted.
    fn validate(&self) -> Result<(f64, f64), ApiError> {
        let mut errors = ValidationErrorBuilder::new();

        for (value, field) in [
            (&self.subsidy_type, "subsidyType"),
            (&self.crop_type, "cropType"),
            (&self.purpose, "purpose"),
            (&self.description, "description"),
            (&self.contact_number, "contactNumber"),
        ] {
            if let Err(e) = validate_required(value, field) {
                errors.add(field, e);
            }
        }

        let farm_area = self.farm_area.trim().parse::<f64>();
        if self.farm_area.trim().is_empty() {
            errors.add("farmArea", "farmArea is required");
        } else if farm_area.is_err() {
            errors.add("farmArea", "farmArea must be a number");
        }

        let expected_amount = self.expected_amount.trim().parse::<f64>();
        if self.expected_amount.trim().is_empty() {
            errors.add("expectedAmount", "expectedAmount is required");
        } else if expected_amount.is_err() {
            errors.add("expectedAmount", "expectedAmount must be a number");
        }

        errors.finish()?;
        Ok((farm_area.unwrap_or(0.0), expected_amount.unwrap_or(0.0)))
    }
}

/// Submit a subsidy application (multipart, up to seven document uploads)
pub async fn apply(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApplicationEnvelope>), ApiError> {
    let form = ApplicationForm::from_multipart(multipart).await?;
    let (farm_area, expected_amount) = form.validate()?;

    // Persist document uploads only after validation passed
    let mut stored: HashMap<&str, String> = HashMap::new();
    for field in DOCUMENT_FIELDS {
        if let Some((filename, bytes)) = form.documents.get(field) {
            let file = uploads::store_upload(
                &state.config.server.upload_dir,
                "subsidy",
                filename,
                bytes,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to store subsidy document: {}", e);
                ApiError::internal("Failed to store subsidy document")
            })?;
            stored.insert(field, file.filename);
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO subsidy_applications (
            id, farmer_id, subsidy_type, crop_type, farm_area, expected_amount,
            purpose, description, contact_number, citizenship_front, citizenship_back,
            nid_front, nid_back, land_ownership, farmer_reg, other, status,
            applied_date, admin_replies
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, '[]')
        "#,
    )
    .bind(&id)
    .bind(&identity.id)
    .bind(&form.subsidy_type)
    .bind(&form.crop_type)
    .bind(farm_area)
    .bind(expected_amount)
    .bind(&form.purpose)
    .bind(&form.description)
    .bind(&form.contact_number)
    .bind(stored.get("citizenshipFront").map(String::as_str))
    .bind(stored.get("citizenshipBack").map(String::as_str))
    .bind(stored.get("nidFront").map(String::as_str))
    .bind(stored.get("nidBack").map(String::as_str))
    .bind(stored.get("landOwnership").map(String::as_str))
    .bind(stored.get("farmerReg").map(String::as_str))
    .bind(stored.get("other").map(String::as_str))
    .bind(&now)
    .execute(&state.db)
    .await?;

    let application = SubsidyApplication::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::internal("Failed to load submitted application"))?;

    Ok((
        StatusCode::CREATED,
        Json(ApplicationEnvelope {
            message: "Application submitted".to_string(),
            application: SubsidyApplicationResponse::from(application),
        }),
    ))
}

/// The authenticated farmer's own applications, newest first
pub async fn history(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
) -> Result<Json<Vec<SubsidyApplicationResponse>>, ApiError> {
    let applications = SubsidyApplication::list_for_farmer(&state.db, &identity.id).await?;
    Ok(Json(
        applications
            .into_iter()
            .map(SubsidyApplicationResponse::from)
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsidyWithApplicant {
    #[serde(flatten)]
    pub application: SubsidyApplicationResponse,
    pub applicant_name: Option<String>,
    pub applicant_email: Option<String>,
}

/// Admin listing of all applications with applicant contact details
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<SubsidyWithApplicant>>, ApiError> {
    let applications: Vec<SubsidyApplication> =
        sqlx::query_as("SELECT * FROM subsidy_applications ORDER BY applied_date DESC")
            .fetch_all(&state.db)
            .await?;

    let mut results = Vec::new();
    for application in applications {
        let applicant: Option<(String, String)> =
            sqlx::query_as("SELECT name, email FROM farmers WHERE id = ?")
                .bind(&application.farmer_id)
                .fetch_optional(&state.db)
                .await?;

        let (applicant_name, applicant_email) = match applicant {
            Some((name, email)) => (Some(name), Some(email)),
            None => (None, None),
        };

        results.push(SubsidyWithApplicant {
            application: SubsidyApplicationResponse::from(application),
            applicant_name,
            applicant_email,
        });
    }

    Ok(Json(results))
}

#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    pub documents: HashMap<String, String>,
}

/// Public URLs for the populated document slots of one application;
/// visible to the owning farmer and to admins
pub async fn get_documents(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let application = SubsidyApplication::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    if caller.role != ROLE_ADMIN && application.farmer_id != caller.id {
        return Err(ApiError::not_found("Application not found"));
    }

    Ok(Json(DocumentsResponse {
        documents: application.document_urls(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Set an application's status; pending/approved/rejected in any order
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApplicationEnvelope>, ApiError> {
    if let Err(e) = validate_subsidy_status(&request.status) {
        return Err(ApiError::validation_field("status", e));
    }

    let result = sqlx::query("UPDATE subsidy_applications SET status = ? WHERE id = ?")
        .bind(&request.status)
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Application not found"));
    }

    let application = SubsidyApplication::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    Ok(Json(ApplicationEnvelope {
        message: "Status updated".to_string(),
        application: SubsidyApplicationResponse::from(application),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AdminReplyRequest {
    pub reply: String,
}

/// Append an admin reply to an application's thread
pub async fn add_reply(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
    Json(request): Json<AdminReplyRequest>,
) -> Result<Json<ApplicationEnvelope>, ApiError> {
    if let Err(e) = validate_required(&request.reply, "reply") {
        return Err(ApiError::validation_field("reply", e));
    }

    let application = SubsidyApplication::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    let mut replies = application.reply_list();
    replies.push(request.reply);
    let replies_json = serde_json::to_string(&replies)
        .map_err(|_| ApiError::internal("Failed to encode reply list"))?;

    sqlx::query("UPDATE subsidy_applications SET admin_replies = ? WHERE id = ?")
        .bind(&replies_json)
        .bind(&application.id)
        .execute(&state.db)
        .await?;

    let application = SubsidyApplication::find_by_id(&state.db, &application.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;

    Ok(Json(ApplicationEnvelope {
        message: "Reply added".to_string(),
        application: SubsidyApplicationResponse::from(application),
    }))
}

#[derive(Debug, Deserialize)]
pub struct OngoingSubsidyRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct OngoingEnvelope {
    pub message: String,
    pub subsidy: OngoingSubsidy,
}

/// Publish an ongoing-subsidy announcement
pub async fn create_ongoing(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Json(request): Json<OngoingSubsidyRequest>,
) -> Result<(StatusCode, Json<OngoingEnvelope>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_required(&request.title, "title") {
        errors.add("title", e);
    }
    if let Err(e) = validate_required(&request.description, "description") {
        errors.add("description", e);
    }
    errors.finish()?;

    let subsidy = OngoingSubsidy {
        id: uuid::Uuid::new_v4().to_string(),
        title: request.title,
        description: request.description,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    sqlx::query("INSERT INTO ongoing_subsidies (id, title, description, created_at) VALUES (?, ?, ?, ?)")
        .bind(&subsidy.id)
        .bind(&subsidy.title)
        .bind(&subsidy.description)
        .bind(&subsidy.created_at)
        .execute(&state.db)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OngoingEnvelope {
            message: "Subsidy published".to_string(),
            subsidy,
        }),
    ))
}

/// List announcements, newest first; readable without a token
pub async fn list_ongoing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OngoingSubsidy>>, ApiError> {
    let subsidies: Vec<OngoingSubsidy> =
        sqlx::query_as("SELECT * FROM ongoing_subsidies ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(subsidies))
}

/// Edit an announcement
pub async fn update_ongoing(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
    Json(request): Json<OngoingSubsidyRequest>,
) -> Result<Json<OngoingEnvelope>, ApiError> {
    let result = sqlx::query("UPDATE ongoing_subsidies SET title = ?, description = ? WHERE id = ?")
        .bind(&request.title)
        .bind(&request.description)
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Subsidy not found"));
    }

    let subsidy: OngoingSubsidy = sqlx::query_as("SELECT * FROM ongoing_subsidies WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(OngoingEnvelope {
        message: "Subsidy updated".to_string(),
        subsidy,
    }))
}

/// Remove an announcement
pub async fn delete_ongoing(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM ongoing_subsidies WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Subsidy not found"));
    }

    Ok(Json(MessageResponse::new("Subsidy deleted")))
}
