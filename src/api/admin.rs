//! Admin endpoints: login and the read-side dashboard aggregation (counts,
//! histograms, and fixed-width monthly trend buckets over farmers, issues and
//! subsidy applications).

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{Admin, AdminResponse, Farmer, FarmerResponse};
use crate::AppState;

use super::auth::{issue_token, verify_password, AdminIdentity, ROLE_ADMIN};
use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub admin: AdminResponse,
}

/// Admin login; the token carries role and permission claims
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, ApiError> {
    let admin = Admin::find_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &admin.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE admins SET last_login = ? WHERE id = ?")
        .bind(&now)
        .bind(&admin.id)
        .execute(&state.db)
        .await?;

    let token = issue_token(
        &state.config.auth,
        &admin.id,
        ROLE_ADMIN,
        Some(admin.permission_list()),
    )?;

    let mut admin = admin;
    admin.last_login = Some(now);

    Ok(Json(AdminLoginResponse {
        token,
        admin: AdminResponse::from(admin),
    }))
}

/// Farmer row in the admin listing, annotated with activity counts
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerWithCounts {
    #[serde(flatten)]
    pub farmer: FarmerResponse,
    pub subsidy_applications: i64,
    pub issues_reported: i64,
}

/// List all farmers with their subsidy and issue counts
pub async fn list_farmers(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<FarmerWithCounts>>, ApiError> {
    let farmers: Vec<Farmer> = sqlx::query_as("SELECT * FROM farmers ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;

    let mut results = Vec::new();
    for farmer in farmers {
        let subsidies: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM subsidy_applications WHERE farmer_id = ?")
                .bind(&farmer.id)
                .fetch_one(&state.db)
                .await?;
        let issues: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM crop_issues WHERE farmer_id = ?")
                .bind(&farmer.id)
                .fetch_one(&state.db)
                .await?;

        results.push(FarmerWithCounts {
            farmer: FarmerResponse::from(farmer),
            subsidy_applications: subsidies.0,
            issues_reported: issues.0,
        });
    }

    Ok(Json(results))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_farmers: i64,
    pub total_issues: i64,
    pub pending_subsidies: i64,
}

/// Headline dashboard counters
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<DashboardStats>, ApiError> {
    let total_farmers: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM farmers")
        .fetch_one(&state.db)
        .await?;
    let total_issues: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crop_issues")
        .fetch_one(&state.db)
        .await?;
    let pending_subsidies: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subsidy_applications WHERE status = 'pending'")
            .fetch_one(&state.db)
            .await?;

    Ok(Json(DashboardStats {
        total_farmers: total_farmers.0,
        total_issues: total_issues.0,
        pending_subsidies: pending_subsidies.0,
    }))
}

/// Histogram of issues by category; a blank category counts as "Other"
pub async fn issues_category(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<HashMap<String, i64>>, ApiError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT category FROM crop_issues")
        .fetch_all(&state.db)
        .await?;

    let mut counts: HashMap<String, i64> = HashMap::new();
    for (category,) in rows {
        let key = if category.is_empty() {
            "Other".to_string()
        } else {
            category
        };
        *counts.entry(key).or_insert(0) += 1;
    }

    Ok(Json(counts))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFarmer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: String,
}

/// Five most recently registered farmers
pub async fn recent_farmers(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<RecentFarmer>>, ApiError> {
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT id, name, email, created_at FROM farmers ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(id, name, email, created_at)| RecentFarmer {
                id,
                name,
                email,
                created_at,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentIssue {
    pub id: String,
    pub title: String,
    pub status: String,
    pub reported_date: String,
    pub category: String,
    pub farmer_name: Option<String>,
}

/// Five most recently reported issues, with the reporter's name when known
pub async fn recent_issues(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<RecentIssue>>, ApiError> {
    let rows: Vec<(String, String, String, String, String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT i.id, i.title, i.status, i.reported_date, i.category, f.name
        FROM crop_issues i
        LEFT JOIN farmers f ON f.id = i.farmer_id
        ORDER BY i.reported_date DESC
        LIMIT 5
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(
                |(id, title, status, reported_date, category, farmer_name)| RecentIssue {
                    id,
                    title,
                    status,
                    reported_date,
                    category,
                    farmer_name,
                },
            )
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSubsidy {
    pub farmer_name: String,
    pub subsidy_type: String,
    pub status: String,
    pub applied_date: String,
}

/// Five most recent subsidy applications
pub async fn recent_subsidies(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<Vec<RecentSubsidy>>, ApiError> {
    let rows: Vec<(Option<String>, String, String, String)> = sqlx::query_as(
        r#"
        SELECT f.name, s.subsidy_type, s.status, s.applied_date
        FROM subsidy_applications s
        LEFT JOIN farmers f ON f.id = s.farmer_id
        ORDER BY s.applied_date DESC
        LIMIT 5
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(farmer_name, subsidy_type, status, applied_date)| RecentSubsidy {
                farmer_name: farmer_name.unwrap_or_else(|| "Unknown".to_string()),
                subsidy_type,
                status,
                applied_date,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub period: Option<u32>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub count: i64,
}

/// The N most recent calendar months ending at `now`, chronological
fn month_window(now: DateTime<Utc>, period: u32) -> Vec<(i32, u32)> {
    let total = now.year() * 12 + now.month0() as i32;
    (0..period as i32)
        .rev()
        .map(|back| {
            let t = total - back;
            (t.div_euclid(12), t.rem_euclid(12) as u32 + 1)
        })
        .collect()
}

fn month_key(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

/// Bucket RFC 3339 timestamps into the window; anything outside it (or
/// unparsable) is silently discarded
fn bucket_by_month(dates: &[String], window: &[(i32, u32)]) -> Vec<TrendPoint> {
    let mut counts: Vec<i64> = vec![0; window.len()];
    for date in dates {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
            let key = (parsed.year(), parsed.month());
            if let Some(pos) = window.iter().position(|w| *w == key) {
                counts[pos] += 1;
            }
        }
    }

    window
        .iter()
        .zip(counts)
        .map(|(&(year, month), count)| TrendPoint {
            month: month_key(year, month),
            count,
        })
        .collect()
}

async fn monthly_trend(
    state: &AppState,
    date_sql: &str,
    period: Option<u32>,
) -> Result<Vec<TrendPoint>, ApiError> {
    let period = period.filter(|p| *p > 0).unwrap_or(12);
    let rows: Vec<(String,)> = sqlx::query_as(date_sql).fetch_all(&state.db).await?;
    let dates: Vec<String> = rows.into_iter().map(|(d,)| d).collect();

    let window = month_window(Utc::now(), period);
    Ok(bucket_by_month(&dates, &window))
}

/// Subsidy submissions per month over the requested window (default 12)
pub async fn subsidy_trends(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let trend = monthly_trend(
        &state,
        "SELECT applied_date FROM subsidy_applications",
        query.period,
    )
    .await?;
    Ok(Json(trend))
}

/// Farmer registrations per month over the requested window (default 12)
pub async fn farmer_trends(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let trend = monthly_trend(&state, "SELECT created_at FROM farmers", query.period).await?;
    Ok(Json(trend))
}

/// Issue reports per month over the requested window (default 12)
pub async fn issue_trends(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let trend = monthly_trend(&state, "SELECT reported_date FROM crop_issues", query.period).await?;
    Ok(Json(trend))
}

#[derive(Debug, Serialize)]
pub struct SeverityStats {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

/// Issue counts split by severity
pub async fn issue_severity_stats(
    State(state): State<Arc<AppState>>,
    _admin: AdminIdentity,
) -> Result<Json<SeverityStats>, ApiError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT severity FROM crop_issues")
        .fetch_all(&state.db)
        .await?;

    let mut stats = SeverityStats {
        low: 0,
        medium: 0,
        high: 0,
    };
    for (severity,) in rows {
        match severity.as_str() {
            "low" => stats.low += 1,
            "medium" => stats.medium += 1,
            "high" => stats.high += 1,
            _ => {}
        }
    }

    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{seed_farmer, test_state};
    use chrono::TimeZone;

    #[test]
    fn test_month_window_spans_year_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 2, 15, 12, 0, 0).unwrap();
        let window = month_window(now, 4);
        assert_eq!(
            window,
            vec![(2025, 11), (2025, 12), (2026, 1), (2026, 2)]
        );
    }

    #[test]
    fn test_month_key_zero_pads() {
        assert_eq!(month_key(2026, 3), "2026-03");
        assert_eq!(month_key(2026, 11), "2026-11");
    }

    #[test]
    fn test_bucket_by_month_excludes_out_of_window_records() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 0, 0, 0).unwrap();
        let window = month_window(now, 3);

        let dates = vec![
            "2026-08-01T10:00:00+00:00".to_string(), // current month
            "2026-06-20T10:00:00+00:00".to_string(), // two months prior
            "2026-01-01T10:00:00+00:00".to_string(), // outside the window
            "not-a-date".to_string(),                // unparsable, discarded
        ];

        let trend = bucket_by_month(&dates, &window);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].month, "2026-06");
        assert_eq!(trend[0].count, 1);
        assert_eq!(trend[1].month, "2026-07");
        assert_eq!(trend[1].count, 0);
        assert_eq!(trend[2].month, "2026-08");
        assert_eq!(trend[2].count, 1);

        let total: i64 = trend.iter().map(|p| p.count).sum();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_dashboard_stats_counts_pending_only() {
        let state = test_state().await;
        seed_farmer(&state.db, "f1", "one@example.com").await;

        let now = Utc::now().to_rfc3339();
        for (id, status) in [("s1", "pending"), ("s2", "approved"), ("s3", "pending")] {
            sqlx::query(
                r#"
                INSERT INTO subsidy_applications (
                    id, farmer_id, subsidy_type, crop_type, farm_area, expected_amount,
                    purpose, description, contact_number, status, applied_date
                ) VALUES (?, 'f1', 'Seed', 'Rice', 1.0, 1000.0, 'p', 'd', '98', ?, ?)
                "#,
            )
            .bind(id)
            .bind(status)
            .bind(&now)
            .execute(&state.db)
            .await
            .unwrap();
        }

        let admin = AdminIdentity {
            id: "a1".to_string(),
            permissions: vec!["all".to_string()],
        };
        let Json(stats) = dashboard_stats(State(state), admin).await.unwrap();
        assert_eq!(stats.total_farmers, 1);
        assert_eq!(stats.total_issues, 0);
        assert_eq!(stats.pending_subsidies, 2);
    }
}
