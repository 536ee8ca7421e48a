//! Farmer account model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Farmer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub reset_otp: Option<String>,
    pub reset_otp_expiry: Option<String>,
    pub location: String,
    pub phone: String,
    pub farmer_type: String,
    pub farm_size: String,
    pub gender: String,
    pub dob: String,
    pub profile_pic: String,
    pub terms_agreed: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl Farmer {
    pub async fn find_by_id(db: &DbPool, id: &str) -> Result<Option<Farmer>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM farmers WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_email(db: &DbPool, email: &str) -> Result<Option<Farmer>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM farmers WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }
}

/// Profile shape returned to clients; never carries the password hash
/// or reset-code fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: String,
    pub phone: String,
    pub farmer_type: String,
    pub farm_size: String,
    pub gender: String,
    pub dob: String,
    pub profile_pic: String,
    pub terms_agreed: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<Farmer> for FarmerResponse {
    fn from(farmer: Farmer) -> Self {
        Self {
            id: farmer.id,
            name: farmer.name,
            email: farmer.email,
            location: farmer.location,
            phone: farmer.phone,
            farmer_type: farmer.farmer_type,
            farm_size: farmer.farm_size,
            gender: farmer.gender,
            dob: farmer.dob,
            profile_pic: farmer.profile_pic,
            terms_agreed: farmer.terms_agreed,
            created_at: farmer.created_at,
            last_login: farmer.last_login,
        }
    }
}
