mod admin;
pub mod auth;
mod chat;
mod disease;
pub mod error;
mod farmer;
mod issues;
mod market;
mod password;
mod subsidy;
mod validation;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;

/// Request bodies (including uploads) are capped at 20 MB
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Simple `{ "message": ... }` response body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public auth routes
    let auth_routes = Router::new()
        .route("/check-email", post(auth::check_email))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let farmer_routes = Router::new()
        .route("/change-password", post(farmer::change_password))
        .route("/:id", get(farmer::get_profile))
        .route("/:id", put(farmer::update_profile));

    let password_routes = Router::new()
        .route("/forgot-password", post(password::forgot_password))
        .route("/reset-password", post(password::reset_password));

    let admin_routes = Router::new()
        .route("/login", post(admin::login))
        .route("/farmers", get(admin::list_farmers))
        .route("/dashboard-stats", get(admin::dashboard_stats))
        .route("/issues-category", get(admin::issues_category))
        .route("/recent-farmers", get(admin::recent_farmers))
        .route("/recent-issues", get(admin::recent_issues))
        .route("/recent-subsidies", get(admin::recent_subsidies))
        .route("/subsidy-trends", get(admin::subsidy_trends))
        .route("/farmer-trends", get(admin::farmer_trends))
        .route("/issue-trends", get(admin::issue_trends))
        .route("/issue-severity-stats", get(admin::issue_severity_stats));

    let issue_routes = Router::new()
        .route("/", post(issues::create_issue))
        .route("/", get(issues::list_issues))
        .route("/my-issues", get(issues::my_issues))
        .route("/:id", get(issues::get_issue))
        .route("/:id/status", patch(issues::update_status))
        .route("/:id/reply", post(issues::add_reply));

    let subsidy_routes = Router::new()
        .route("/apply", post(subsidy::apply))
        .route("/history", get(subsidy::history))
        .route("/all", get(subsidy::list_all))
        .route("/documents/:id", get(subsidy::get_documents))
        .route("/update-status/:id", put(subsidy::update_status))
        .route("/reply/:id", put(subsidy::add_reply))
        .route("/ongoing", post(subsidy::create_ongoing))
        .route("/ongoing", get(subsidy::list_ongoing))
        .route("/ongoing/:id", put(subsidy::update_ongoing))
        .route("/ongoing/:id", delete(subsidy::delete_ongoing));

    let chat_routes = Router::new()
        .route("/sessions/count", get(chat::session_count))
        .route("/sessions", get(chat::list_sessions))
        .route("/sessions", post(chat::create_session))
        .route("/sessions/:id/messages", get(chat::get_messages))
        .route("/sessions/:id/messages", post(chat::append_messages))
        .route("/sessions/:id/title", patch(chat::update_title))
        .route("/sessions/:id", delete(chat::delete_session))
        .route("/history", get(chat::history))
        .route("/history", delete(chat::clear_history));

    let disease_routes = Router::new()
        .route("/save", post(disease::save_detection))
        .route("/recent", get(disease::recent))
        .route("/:id", get(disease::get_detection))
        .route("/:id", delete(disease::delete_detection));

    let market_routes = Router::new().route("/market-prices", get(market::market_prices));

    // Serve uploaded files
    let serve_uploads = ServeDir::new(&state.config.server.upload_dir);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/farmer", farmer_routes)
        .nest("/api/password", password_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/issues", issue_routes)
        .nest("/api/subsidy", subsidy_routes)
        .nest("/api/chat", chat_routes)
        .nest("/api/disease", disease_routes)
        .nest("/api", market_routes)
        .nest_service("/uploads", serve_uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::{FromRequest, Multipart};
    use axum::http::Request;

    use crate::config::Config;
    use crate::DbPool;

    /// Build a Multipart extractor over simple text fields
    pub(crate) async fn multipart_from_fields(fields: &[(&str, &str)]) -> Multipart {
        let boundary = "test-boundary";
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            ));
        }
        body.push_str(&format!("--{}--\r\n", boundary));

        let request = Request::builder()
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    /// App state over a fresh in-memory database with default config
    pub(crate) async fn test_state() -> Arc<AppState> {
        let pool = crate::db::test_pool().await;
        Arc::new(AppState::new(Config::default(), pool))
    }

    /// Insert a farmer whose password is "password"
    pub(crate) async fn seed_farmer(db: &DbPool, id: &str, email: &str) {
        let password_hash = auth::hash_password("password").unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO farmers (
                id, name, email, password_hash, location, phone, farmer_type,
                farm_size, gender, dob, profile_pic, terms_agreed, created_at
            ) VALUES (?, 'Test Farmer', ?, ?, '', '', '', '', '', '', '', 1, ?)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(&password_hash)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_router_builds() {
        let state = test_state().await;
        let _router = create_router(state);
    }
}
