//! Disease detection log endpoints. The write path is defensive: missing
//! severity/treatment/prevention values are coerced to sentinels and an
//! unparsable confidence becomes 0 rather than a rejection.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::DiseaseDetection;
use crate::uploads;
use crate::AppState;

use super::auth::FarmerIdentity;
use super::error::ApiError;
use super::validation::validate_detection_severity;
use super::MessageResponse;

const DEFAULT_RECENT_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct DetectionEnvelope {
    pub message: String,
    pub detection: DiseaseDetection,
}

/// Parse a confidence value, treating anything unparsable or non-finite as 0
fn coerce_confidence(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[derive(Debug, Default)]
struct DetectionForm {
    disease: String,
    confidence: String,
    severity: String,
    treatment: String,
    prevention: String,
    image: Option<(String, Vec<u8>)>,
}

impl DetectionForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = DetectionForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let filename = field.file_name().unwrap_or_default().to_string();
                if !uploads::is_image_filename(&filename) {
                    return Err(ApiError::bad_request("Only image files are allowed"));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid file upload: {}", e)))?;
                form.image = Some((filename, bytes.to_vec()));
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
            match name.as_str() {
                "disease" => form.disease = value,
                "confidence" => form.confidence = value,
                "severity" => form.severity = value,
                "treatment" => form.treatment = value,
                "prevention" => form.prevention = value,
                _ => {}
            }
        }

        Ok(form)
    }
}

/// Persist a detection result with its optional scan image
pub async fn save_detection(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DetectionEnvelope>), ApiError> {
    let form = DetectionForm::from_multipart(multipart).await?;

    if form.disease.trim().is_empty() {
        return Err(ApiError::validation_field("disease", "Missing disease name"));
    }

    let severity = if form.severity.is_empty() {
        "None".to_string()
    } else {
        validate_detection_severity(&form.severity)
            .map_err(|e| ApiError::validation_field("severity", e))?;
        form.severity.clone()
    };

    let treatment = if form.treatment.is_empty() {
        "Not specified".to_string()
    } else {
        form.treatment.clone()
    };
    let prevention = if form.prevention.is_empty() {
        "Not specified".to_string()
    } else {
        form.prevention.clone()
    };

    let image_url = match &form.image {
        Some((filename, bytes)) => {
            let stored = uploads::store_upload(
                &state.config.server.upload_dir,
                "disease-images",
                filename,
                bytes,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to store scan image: {}", e);
                ApiError::internal("Failed to store scan image")
            })?;
            Some(stored.url)
        }
        None => None,
    };

    let detection = DiseaseDetection {
        id: uuid::Uuid::new_v4().to_string(),
        farmer_id: identity.id,
        disease: form.disease,
        confidence: coerce_confidence(&form.confidence),
        severity,
        treatment,
        prevention,
        image_url,
        scanned_at: chrono::Utc::now().to_rfc3339(),
    };

    sqlx::query(
        r#"
        INSERT INTO disease_detections (
            id, farmer_id, disease, confidence, severity, treatment,
            prevention, image_url, scanned_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&detection.id)
    .bind(&detection.farmer_id)
    .bind(&detection.disease)
    .bind(detection.confidence)
    .bind(&detection.severity)
    .bind(&detection.treatment)
    .bind(&detection.prevention)
    .bind(&detection.image_url)
    .bind(&detection.scanned_at)
    .execute(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(DetectionEnvelope {
            message: "Detection saved successfully".to_string(),
            detection,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// The farmer's most recent scans
pub async fn recent(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<DiseaseDetection>>, ApiError> {
    let limit = query
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_RECENT_LIMIT);
    let detections = DiseaseDetection::recent_for_farmer(&state.db, &identity.id, limit).await?;
    Ok(Json(detections))
}

/// Fetch one owned detection
pub async fn get_detection(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(id): Path<String>,
) -> Result<Json<DiseaseDetection>, ApiError> {
    let detection = DiseaseDetection::find_owned(&state.db, &id, &identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Detection not found"))?;

    Ok(Json(detection))
}

/// Delete one owned detection
pub async fn delete_detection(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM disease_detections WHERE id = ? AND farmer_id = ?")
        .bind(&id)
        .bind(&identity.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Detection not found"));
    }

    Ok(Json(MessageResponse::new("Detection deleted successfully")))
}
