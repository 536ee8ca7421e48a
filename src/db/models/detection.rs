//! Disease detection log model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::DbPool;

pub const DETECTION_SEVERITIES: [&str; 5] = ["Healthy", "None", "Mild", "Moderate", "Severe"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseDetection {
    pub id: String,
    pub farmer_id: String,
    pub disease: String,
    pub confidence: f64,
    pub severity: String,
    pub treatment: String,
    pub prevention: String,
    pub image_url: Option<String>,
    pub scanned_at: String,
}

impl DiseaseDetection {
    /// Fetch a detection only if it belongs to the given farmer
    pub async fn find_owned(
        db: &DbPool,
        id: &str,
        farmer_id: &str,
    ) -> Result<Option<DiseaseDetection>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM disease_detections WHERE id = ? AND farmer_id = ?")
            .bind(id)
            .bind(farmer_id)
            .fetch_optional(db)
            .await
    }

    pub async fn recent_for_farmer(
        db: &DbPool,
        farmer_id: &str,
        limit: i64,
    ) -> Result<Vec<DiseaseDetection>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM disease_detections WHERE farmer_id = ? ORDER BY scanned_at DESC LIMIT ?",
        )
        .bind(farmer_id)
        .bind(limit)
        .fetch_all(db)
        .await
    }
}
