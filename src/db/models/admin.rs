//! Admin account model. Admin accounts are seeded at startup and carry a
//! permission list stored as a JSON array.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub phone: String,
    pub status: String,
    pub permissions: String, // JSON array of permission names
    pub role: String,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl Admin {
    pub async fn find_by_email(db: &DbPool, email: &str) -> Result<Option<Admin>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM admins WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
    }

    /// Parse the stored permission list, falling back to the catch-all grant
    pub fn permission_list(&self) -> Vec<String> {
        serde_json::from_str(&self.permissions).unwrap_or_else(|_| vec!["all".to_string()])
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub permissions: Vec<String>,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl From<Admin> for AdminResponse {
    fn from(admin: Admin) -> Self {
        let permissions = admin.permission_list();
        Self {
            id: admin.id,
            name: admin.name,
            email: admin.email,
            role: admin.role,
            status: admin.status,
            permissions,
            last_login: admin.last_login,
            created_at: admin.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_with_permissions(raw: &str) -> Admin {
        Admin {
            id: "a1".to_string(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            avatar: String::new(),
            phone: String::new(),
            status: "active".to_string(),
            permissions: raw.to_string(),
            role: "admin".to_string(),
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            last_login: None,
        }
    }

    #[test]
    fn test_permission_list_parses_json() {
        let admin = admin_with_permissions(r#"["subsidy","issues"]"#);
        assert_eq!(admin.permission_list(), vec!["subsidy", "issues"]);
    }

    #[test]
    fn test_permission_list_falls_back_on_garbage() {
        let admin = admin_with_permissions("not-json");
        assert_eq!(admin.permission_list(), vec!["all"]);
    }
}
