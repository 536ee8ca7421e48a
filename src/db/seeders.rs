//! Database seeders for built-in data.
//!
//! Admin accounts are not self-registered; a default account is created from
//! configuration on first startup.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::AuthConfig;

/// Create the configured default admin account if no admin exists yet
pub async fn seed_default_admin(pool: &SqlitePool, auth: &AuthConfig) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(pool)
        .await?;

    if count.0 > 0 {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = crate::api::auth::hash_password(&auth.admin_password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO admins (id, name, email, password_hash, status, permissions, role, created_at)
        VALUES (?, ?, ?, ?, 'active', '["all"]', 'admin', ?)
        "#,
    )
    .bind(&id)
    .bind(&auth.admin_name)
    .bind(&auth.admin_email)
    .bind(&password_hash)
    .bind(&now)
    .execute(pool)
    .await?;

    info!("Seeded default admin account: {}", auth.admin_email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let pool = crate::db::test_pool().await;
        let auth = AuthConfig::default();

        seed_default_admin(&pool, &auth).await.unwrap();
        seed_default_admin(&pool, &auth).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
