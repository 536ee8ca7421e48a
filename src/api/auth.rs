//! Authentication: password hashing, signed session tokens, and identity
//! extractors for protected routes.
//!
//! Farmers self-register; admins are seeded from configuration. Both receive
//! an HS256 JWT carrying their id and role (admins also carry their
//! permission list). Login failures never distinguish an unknown email from a
//! wrong password.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{Farmer, FarmerResponse};
use crate::uploads;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password, validate_required};
use super::MessageResponse;

pub const ROLE_FARMER: &str = "farmer";
pub const ROLE_ADMIN: &str = "admin";

/// Claims carried by a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: farmer or admin id
    pub sub: String,
    /// Caller role: "farmer" or "admin"
    pub role: String,
    /// Permission names, present for admin tokens only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    pub iat: i64,
    pub exp: i64,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Issue a signed session token for the given subject and role
pub fn issue_token(
    config: &crate::config::AuthConfig,
    subject: &str,
    role: &str,
    permissions: Option<Vec<String>>,
) -> Result<String, ApiError> {
    let now = chrono::Utc::now();
    let exp = now + chrono::Duration::days(config.token_ttl_days);

    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        permissions,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign session token: {}", e);
        ApiError::internal("Failed to issue session token")
    })
}

/// Decode and verify a session token, returning its claims
pub fn decode_token(config: &crate::config::AuthConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::unauthorized("Invalid or expired token"))
}

/// Extract the bearer token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Authenticated farmer identity, extracted from the bearer token
#[derive(Debug, Clone)]
pub struct FarmerIdentity {
    pub id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for FarmerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        let claims = decode_token(&state.config.auth, &token)?;

        if claims.role != ROLE_FARMER {
            return Err(ApiError::forbidden("Farmer token required"));
        }

        Ok(FarmerIdentity { id: claims.sub })
    }
}

/// Authenticated admin identity, extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub id: String,
    pub permissions: Vec<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        let claims = decode_token(&state.config.auth, &token)?;

        if claims.role != ROLE_ADMIN {
            return Err(ApiError::forbidden("Admin token required"));
        }

        Ok(AdminIdentity {
            id: claims.sub,
            permissions: claims.permissions.unwrap_or_default(),
        })
    }
}

/// Any authenticated caller, farmer or admin
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub id: String,
    pub role: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
        let claims = decode_token(&state.config.auth, &token)?;

        Ok(CallerIdentity {
            id: claims.sub,
            role: claims.role,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckEmailRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CheckEmailResponse {
    pub exists: bool,
}

/// Check whether an email is already registered
pub async fn check_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckEmailRequest>,
) -> Result<Json<CheckEmailResponse>, ApiError> {
    let existing = Farmer::find_by_email(&state.db, &request.email).await?;
    Ok(Json(CheckEmailResponse {
        exists: existing.is_some(),
    }))
}

#[derive(Debug, Default)]
struct RegisterForm {
    name: String,
    email: String,
    password: String,
    phone: String,
    location: String,
    farmer_type: String,
    farm_size: String,
    gender: String,
    dob: String,
    terms_agreed: bool,
    profile_pic: Option<(String, Vec<u8>)>,
}

impl RegisterForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = RegisterForm::default();

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
                form.profile_pic = Some((filename, bytes.to_vec()));
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))?;
            match name.as_str() {
                "name" => form.name = value,
                "email" => form.email = value,
                "password" => form.password = value,
                "phone" => form.phone = value,
                "location" => form.location = value,
                "farmerType" => form.farmer_type = value,
                "farmSize" => form.farm_size = value,
                "gender" => form.gender = value,
                "dob" => form.dob = value,
                "termsAgreed" => form.terms_agreed = value == "true",
                _ => {}
            }
        }

        Ok(form)
    }

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrorBuilder::new();

        if let Err(e) = validate_required(&self.name, "name") {
            errors.add("name", e);
        }
        if let Err(e) = validate_email(&self.email) {
            errors.add("email", e);
        }
        if let Err(e) = validate_password(&self.password) {
            errors.add("password", e);
        }

        errors.finish()
    }
}

/// Register a new farmer account (multipart, optional profile picture)
pub async fn register(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let form = RegisterForm::from_multipart(multipart).await?;
    form.validate()?;

    let existing = Farmer::find_by_email(&state.db, &form.email).await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let profile_pic = match &form.profile_pic {
        Some((filename, bytes)) => {
            let stored =
                uploads::store_upload(&state.config.server.upload_dir, "", filename, bytes)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to store profile picture: {}", e);
                        ApiError::internal("Failed to store profile picture")
                    })?;
            stored.url
        }
        None => String::new(),
    };

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&form.password).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO farmers (
            id, name, email, password_hash, location, phone, farmer_type,
            farm_size, gender, dob, profile_pic, terms_agreed, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&form.name)
    .bind(&form.email)
    .bind(&password_hash)
    .bind(&form.location)
    .bind(&form.phone)
    .bind(&form.farmer_type)
    .bind(&form.farm_size)
    .bind(&form.gender)
    .bind(&form.dob)
    .bind(&profile_pic)
    .bind(form.terms_agreed)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Registration successful")),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub farmer: FarmerResponse,
}

/// Farmer login; a successful login refreshes the last-login timestamp
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let farmer = Farmer::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &farmer.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE farmers SET last_login = ? WHERE id = ?")
        .bind(&now)
        .bind(&farmer.id)
        .execute(&state.db)
        .await?;

    let token = issue_token(&state.config.auth, &farmer.id, ROLE_FARMER, None)?;

    let mut farmer = farmer;
    farmer.last_login = Some(now);

    Ok(Json(LoginResponse {
        token,
        farmer: FarmerResponse::from(farmer),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("tomato-field-42").unwrap();
        assert!(verify_password("tomato-field-42", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_roundtrip_carries_role_and_permissions() {
        let config = AuthConfig::default();
        let token = issue_token(
            &config,
            "admin-1",
            ROLE_ADMIN,
            Some(vec!["all".to_string()]),
        )
        .unwrap();

        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "admin-1");
        assert_eq!(claims.role, ROLE_ADMIN);
        assert_eq!(claims.permissions.unwrap(), vec!["all"]);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let config = AuthConfig::default();
        let token = issue_token(&config, "farmer-1", ROLE_FARMER, None).unwrap();

        let mut other = AuthConfig::default();
        other.jwt_secret = "different-secret".to_string();
        assert!(decode_token(&other, &token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let config = AuthConfig::default();
        assert!(decode_token(&config, "not.a.jwt").is_err());
    }

    use crate::api::error::ErrorCode;
    use crate::api::tests::{multipart_from_fields, seed_farmer, test_state};

    const REGISTER_FIELDS: [(&str, &str); 3] = [
        ("name", "Ram Bahadur"),
        ("email", "ram@example.com"),
        ("password", "paddy-field-7"),
    ];

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let state = test_state().await;

        let multipart = multipart_from_fields(&REGISTER_FIELDS).await;
        let first = register(State(state.clone()), multipart).await;
        assert!(first.is_ok());

        let multipart = multipart_from_fields(&REGISTER_FIELDS).await;
        let second = register(State(state.clone()), multipart).await;
        assert_eq!(second.unwrap_err().code(), ErrorCode::Conflict);

        let Json(check) = check_email(
            State(state),
            Json(CheckEmailRequest {
                email: "ram@example.com".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(check.exists);
    }

    #[tokio::test]
    async fn test_register_collects_all_validation_errors() {
        let state = test_state().await;

        let multipart =
            multipart_from_fields(&[("email", "not-an-email"), ("password", "ok")]).await;
        let err = register(State(state), multipart).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_login_does_not_leak_account_existence() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "known@example.com").await;

        let wrong_password = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "known@example.com".to_string(),
                password: "not-the-password".to_string(),
            }),
        )
        .await
        .unwrap_err();

        let unknown_email = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "stranger@example.com".to_string(),
                password: "whatever".to_string(),
            }),
        )
        .await
        .unwrap_err();

        // Same code and same message either way
        assert_eq!(wrong_password.code(), ErrorCode::Unauthorized);
        assert_eq!(unknown_email.code(), ErrorCode::Unauthorized);
        assert_eq!(wrong_password.message(), unknown_email.message());

        let success = login(
            State(state),
            Json(LoginRequest {
                email: "known@example.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(success.0.farmer.last_login.is_some());
        assert!(!success.0.token.is_empty());
    }
}
