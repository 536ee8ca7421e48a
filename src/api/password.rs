//! Two-phase password reset: a 6-digit one-time code mailed to the farmer,
//! then a reset call that proves the code before overwriting the hash.
//!
//! A send failure leaves the stored code in place; the farmer may retry the
//! request phase. A successful reset clears the code, so a second use fails.

use axum::{extract::State, Json};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::db::Farmer;
use crate::notifications::SystemEmailService;
use crate::AppState;

use super::auth::hash_password;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password};
use super::MessageResponse;

/// One-time codes stay valid this long
const OTP_VALID_MINUTES: i64 = 15;

/// Generate a 6-digit one-time code
fn generate_otp() -> String {
    let mut rng = rand::rng();
    format!("{:06}", rng.random_range(0..1_000_000u32))
}

/// Constant-time comparison of a stored code with a submitted one
fn otp_matches(stored: &str, provided: &str) -> bool {
    stored.len() == provided.len() && bool::from(stored.as_bytes().ct_eq(provided.as_bytes()))
}

/// An expiry in the past (or unparsable) means the code is dead
fn otp_expired(expiry: &str, now: chrono::DateTime<chrono::Utc>) -> bool {
    match chrono::DateTime::parse_from_rfc3339(expiry) {
        Ok(t) => t.with_timezone(&chrono::Utc) < now,
        Err(_) => true,
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request phase: store a fresh code on the farmer record and mail it
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_email(&request.email) {
        return Err(ApiError::validation_field("email", e));
    }

    let farmer = Farmer::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::not_found("No account found for this email."))?;

    let otp = generate_otp();
    let expiry = (chrono::Utc::now() + chrono::Duration::minutes(OTP_VALID_MINUTES)).to_rfc3339();

    sqlx::query("UPDATE farmers SET reset_otp = ?, reset_otp_expiry = ? WHERE id = ?")
        .bind(&otp)
        .bind(&expiry)
        .bind(&farmer.id)
        .execute(&state.db)
        .await?;

    // The code stays stored even when dispatch fails; the caller may retry
    let mailer = SystemEmailService::new(state.config.mail.clone());
    mailer
        .send_reset_otp(&farmer.email, &farmer.name, &otp, OTP_VALID_MINUTES)
        .await
        .map_err(|e| {
            tracing::error!("Failed to send OTP email to {}: {}", farmer.email, e);
            ApiError::dependency("Failed to send OTP email")
        })?;

    Ok(Json(MessageResponse::new("OTP sent to your email.")))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
}

/// Completion phase: prove the code, overwrite the hash, clear the code
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if request.otp.is_empty() {
        errors.add("otp", "OTP is required");
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    errors.finish()?;

    let farmer = Farmer::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::not_found("No account found for this email."))?;

    let (stored_otp, stored_expiry) = match (&farmer.reset_otp, &farmer.reset_otp_expiry) {
        (Some(otp), Some(expiry)) => (otp, expiry),
        _ => {
            return Err(ApiError::bad_request(
                "No OTP request found. Please request a new OTP.",
            ))
        }
    };

    if !otp_matches(stored_otp, &request.otp) {
        return Err(ApiError::bad_request("Invalid OTP"));
    }

    if otp_expired(stored_expiry, chrono::Utc::now()) {
        return Err(ApiError::bad_request("OTP expired"));
    }

    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;

    sqlx::query(
        "UPDATE farmers SET password_hash = ?, reset_otp = NULL, reset_otp_expiry = NULL WHERE id = ?",
    )
    .bind(&password_hash)
    .bind(&farmer.id)
    .execute(&state.db)
    .await?;

    Ok(Json(MessageResponse::new("Password reset successful")))
}
