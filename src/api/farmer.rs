//! Farmer profile endpoints: read, update, password change.
//!
//! Profile routes are id-addressed for wire compatibility, but the id must
//! match the authenticated farmer; any other id answers NotFound, the same
//! shape as every ownership miss.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use std::sync::Arc;

use crate::db::{Farmer, FarmerResponse};
use crate::uploads;
use crate::AppState;

use super::auth::{hash_password, verify_password, FarmerIdentity};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_password;
use super::MessageResponse;

/// Fetch the authenticated farmer's profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(id): Path<String>,
) -> Result<Json<FarmerResponse>, ApiError> {
    if id != identity.id {
        return Err(ApiError::not_found("Farmer not found"));
    }

    let farmer = Farmer::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Farmer not found"))?;

    Ok(Json(FarmerResponse::from(farmer)))
}

#[derive(Debug, Default)]
struct ProfileUpdate {
    name: Option<String>,
    phone: Option<String>,
    location: Option<String>,
    farmer_type: Option<String>,
    farm_size: Option<String>,
    gender: Option<String>,
    dob: Option<String>,
    terms_agreed: Option<bool>,
    profile_pic: Option<(String, Vec<u8>)>,
}

impl ProfileUpdate {
    /// Collect update fields from the multipart body. Email and password
    /// hash are never updatable through this route.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut update = ProfileUpdate::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart payload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "profilePic" {
                let filename = field.file_name().unwrap_or("profile").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid file upload: {}", e)))?;
                update.profile_pic = Some((filename, bytes.to_vec()));
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
            match name.as_str() {
                "name" => update.name = Some(value),
                "phone" => update.phone = Some(value),
                "location" => update.location = Some(value),
                "farmerType" => update.farmer_type = Some(value),
                "farmSize" => update.farm_size = Some(value),
                "gender" => update.gender = Some(value),
                "dob" => update.dob = Some(value),
                "termsAgreed" => update.terms_agreed = Some(value == "true"),
                _ => {}
            }
        }

        Ok(update)
    }
}

/// Update the authenticated farmer's profile (multipart, optional new
/// profile picture)
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<FarmerResponse>, ApiError> {
    if id != identity.id {
        return Err(ApiError::not_found("Farmer not found"));
    }

    let _existing = Farmer::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Farmer not found"))?;

    let update = ProfileUpdate::from_multipart(multipart).await?;

    let profile_pic = match &update.profile_pic {
        Some((filename, bytes)) => {
            let stored =
                uploads::store_upload(&state.config.server.upload_dir, "", filename, bytes)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to store profile picture: {}", e);
                        ApiError::internal("Failed to store profile picture")
                    })?;
            Some(stored.url)
        }
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE farmers SET
            name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            location = COALESCE(?, location),
            farmer_type = COALESCE(?, farmer_type),
            farm_size = COALESCE(?, farm_size),
            gender = COALESCE(?, gender),
            dob = COALESCE(?, dob),
            terms_agreed = COALESCE(?, terms_agreed),
            profile_pic = COALESCE(?, profile_pic)
        WHERE id = ?
        "#,
    )
    .bind(&update.name)
    .bind(&update.phone)
    .bind(&update.location)
    .bind(&update.farmer_type)
    .bind(&update.farm_size)
    .bind(&update.gender)
    .bind(&update.dob)
    .bind(update.terms_agreed)
    .bind(&profile_pic)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let farmer = Farmer::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Farmer not found"))?;

    Ok(Json(FarmerResponse::from(farmer)))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Change the authenticated farmer's password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    identity: FarmerIdentity,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if request.current_password.is_empty() {
        errors.add("currentPassword", "Current password is required");
    }
    if let Err(e) = validate_password(&request.new_password) {
        errors.add("newPassword", e);
    }
    errors.finish()?;

    let farmer = Farmer::find_by_id(&state.db, &identity.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Farmer not found"))?;

    if !verify_password(&request.current_password, &farmer.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_hash = hash_password(&request.new_password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    sqlx::query("UPDATE farmers SET password_hash = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(&farmer.id)
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}
