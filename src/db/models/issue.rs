//! Crop issue model: farmer-reported problems with an admin-managed status
//! and an append-only reply thread. The reply thread and image list are
//! embedded JSON columns.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::DbPool;

/// Allowed issue states; transitions may move in any direction
pub const ISSUE_STATUSES: [&str; 3] = ["open", "in_progress", "resolved"];

pub const ISSUE_SEVERITIES: [&str; 3] = ["low", "medium", "high"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CropIssue {
    pub id: String,
    pub title: String,
    pub category: String,
    pub severity: String,
    pub status: String,
    pub reported_date: String,
    pub location: String,
    pub description: String,
    pub urgency: bool,
    pub images: String,  // JSON array of upload paths
    pub farmer_id: Option<String>,
    pub replies: String, // JSON array of IssueReply
    pub created_at: String,
    pub updated_at: String,
}

/// One entry in an issue's reply thread, attributed to an admin or a farmer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReply {
    pub message: String,
    pub sender_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<String>,
    pub created_at: String,
}

impl CropIssue {
    pub async fn find_by_id(db: &DbPool, id: &str) -> Result<Option<CropIssue>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM crop_issues WHERE id = ?")
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_for_farmer(db: &DbPool, farmer_id: &str) -> Result<Vec<CropIssue>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM crop_issues WHERE farmer_id = ? ORDER BY reported_date DESC")
            .bind(farmer_id)
            .fetch_all(db)
            .await
    }

    pub fn image_list(&self) -> Vec<String> {
        serde_json::from_str(&self.images).unwrap_or_default()
    }

    pub fn reply_list(&self) -> Vec<IssueReply> {
        serde_json::from_str(&self.replies).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropIssueResponse {
    pub id: String,
    pub title: String,
    pub category: String,
    pub severity: String,
    pub status: String,
    pub reported_date: String,
    pub location: String,
    pub description: String,
    pub urgency: bool,
    pub images: Vec<String>,
    pub farmer: Option<String>,
    pub replies: Vec<IssueReply>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CropIssue> for CropIssueResponse {
    fn from(issue: CropIssue) -> Self {
        let images = issue.image_list();
        let replies = issue.reply_list();
        Self {
            id: issue.id,
            title: issue.title,
            category: issue.category,
            severity: issue.severity,
            status: issue.status,
            reported_date: issue.reported_date,
            location: issue.location,
            description: issue.description,
            urgency: issue.urgency,
            images,
            farmer: issue.farmer_id,
            replies,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_list_tolerates_empty_and_garbage() {
        let mut issue = CropIssue {
            id: "i1".to_string(),
            title: "Leaf blight".to_string(),
            category: "Disease".to_string(),
            severity: "high".to_string(),
            status: "open".to_string(),
            reported_date: "2026-01-01T00:00:00+00:00".to_string(),
            location: "Ward 4".to_string(),
            description: "Spots on leaves".to_string(),
            urgency: false,
            images: "[]".to_string(),
            farmer_id: None,
            replies: "[]".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        assert!(issue.reply_list().is_empty());

        issue.replies = "{broken".to_string();
        assert!(issue.reply_list().is_empty());
    }

    #[test]
    fn test_reply_round_trips_with_camel_case_keys() {
        let reply = IssueReply {
            message: "Applied fungicide?".to_string(),
            sender_type: "admin".to_string(),
            admin_id: Some("a1".to_string()),
            farmer_id: None,
            created_at: "2026-01-02T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_string(&vec![reply]).unwrap();
        assert!(json.contains("senderType"));
        assert!(!json.contains("farmerId"));

        let parsed: Vec<IssueReply> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0].admin_id.as_deref(), Some("a1"));
    }
}
