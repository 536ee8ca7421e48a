//! Subsidy application and ongoing-subsidy announcement models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

use crate::DbPool;

pub const SUBSIDY_STATUSES: [&str; 3] = ["pending", "approved", "rejected"];

/// The seven optional document-upload slots, in submission order
pub const DOCUMENT_FIELDS: [&str; 7] = [
    "citizenshipFront",
    "citizenshipBack",
    "nidFront",
    "nidBack",
    "landOwnership",
    "farmerReg",
    "other",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubsidyApplication {
    pub id: String,
    pub farmer_id: String,
    pub subsidy_type: String,
    pub crop_type: String,
    pub farm_area: f64,
    pub expected_amount: f64,
    pub purpose: String,
    pub description: String,
    pub contact_number: String,
    pub citizenship_front: Option<String>,
    pub citizenship_back: Option<String>,
    pub nid_front: Option<String>,
    pub nid_back: Option<String>,
    pub land_ownership: Option<String>,
    pub farmer_reg: Option<String>,
    pub other: Option<String>,
    pub status: String,
    pub applied_date: String,
    pub admin_replies: String, // JSON array of reply strings
}

impl SubsidyApplication {
    pub async fn find_by_id(
        db: &DbPool,
        id: &str,
    ) -> Result<Option<SubsidyApplication>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM subsidy_applications WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_farmer(
        db: &DbPool,
        farmer_id: &str,
    ) -> Result<Vec<SubsidyApplication>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM subsidy_applications WHERE farmer_id = ? ORDER BY applied_date DESC",
        )
        .bind(farmer_id)
        .fetch_all(db)
        .await
    }

    pub fn reply_list(&self) -> Vec<String> {
        serde_json::from_str(&self.admin_replies).unwrap_or_default()
    }

    /// Stored filename for a document slot, by its wire-format field name
    pub fn document(&self, field: &str) -> Option<&str> {
        match field {
            "citizenshipFront" => self.citizenship_front.as_deref(),
            "citizenshipBack" => self.citizenship_back.as_deref(),
            "nidFront" => self.nid_front.as_deref(),
            "nidBack" => self.nid_back.as_deref(),
            "landOwnership" => self.land_ownership.as_deref(),
            "farmerReg" => self.farmer_reg.as_deref(),
            "other" => self.other.as_deref(),
            _ => None,
        }
    }

    /// Public URLs for whichever document slots are populated
    pub fn document_urls(&self) -> HashMap<String, String> {
        let mut documents = HashMap::new();
        for field in DOCUMENT_FIELDS {
            if let Some(filename) = self.document(field) {
                documents.insert(field.to_string(), format!("/uploads/subsidy/{}", filename));
            }
        }
        documents
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsidyApplicationResponse {
    pub id: String,
    pub farmer_id: String,
    pub subsidy_type: String,
    pub crop_type: String,
    pub farm_area: f64,
    pub expected_amount: f64,
    pub purpose: String,
    pub description: String,
    pub contact_number: String,
    pub status: String,
    pub applied_date: String,
    pub admin_replies: Vec<String>,
    pub documents: HashMap<String, String>,
}

impl From<SubsidyApplication> for SubsidyApplicationResponse {
    fn from(app: SubsidyApplication) -> Self {
        let admin_replies = app.reply_list();
        let documents = app.document_urls();
        Self {
            id: app.id,
            farmer_id: app.farmer_id,
            subsidy_type: app.subsidy_type,
            crop_type: app.crop_type,
            farm_area: app.farm_area,
            expected_amount: app.expected_amount,
            purpose: app.purpose,
            description: app.description,
            contact_number: app.contact_number,
            status: app.status,
            applied_date: app.applied_date,
            admin_replies,
            documents,
        }
    }
}

/// Admin-authored announcement visible to all farmers
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OngoingSubsidy {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application() -> SubsidyApplication {
        SubsidyApplication {
            id: "s1".to_string(),
            farmer_id: "f1".to_string(),
            subsidy_type: "Seed".to_string(),
            crop_type: "Rice".to_string(),
            farm_area: 2.5,
            expected_amount: 15000.0,
            purpose: "Seed purchase".to_string(),
            description: "Monsoon planting".to_string(),
            contact_number: "9800000000".to_string(),
            citizenship_front: Some("123-front.jpg".to_string()),
            citizenship_back: None,
            nid_front: None,
            nid_back: None,
            land_ownership: Some("123-land.pdf".to_string()),
            farmer_reg: None,
            other: None,
            status: "pending".to_string(),
            applied_date: "2026-01-05T00:00:00+00:00".to_string(),
            admin_replies: "[]".to_string(),
        }
    }

    #[test]
    fn test_document_urls_only_cover_populated_slots() {
        let documents = application().document_urls();
        assert_eq!(documents.len(), 2);
        assert_eq!(
            documents.get("citizenshipFront").map(String::as_str),
            Some("/uploads/subsidy/123-front.jpg")
        );
        assert_eq!(
            documents.get("landOwnership").map(String::as_str),
            Some("/uploads/subsidy/123-land.pdf")
        );
        assert!(!documents.contains_key("nidFront"));
    }

    #[test]
    fn test_document_lookup_rejects_unknown_field() {
        assert!(application().document("passport").is_none());
    }
}
