//! Input validation for API requests.
//!
//! This module provides validation functions for API request data. For
//! collecting multiple validation errors and returning them as an ApiError,
//! use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{DETECTION_SEVERITIES, ISSUE_SEVERITIES, ISSUE_STATUSES, MESSAGE_SENDERS, SUBSIDY_STATUSES};

lazy_static! {
    /// Permissive email shape check; deliverability is proven by the OTP flow
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a raw password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate a required free-text field
pub fn validate_required(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field_name));
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Validate an issue status value
pub fn validate_issue_status(status: &str) -> Result<(), String> {
    if !ISSUE_STATUSES.contains(&status) {
        return Err("Invalid status value".to_string());
    }
    Ok(())
}

/// Validate an issue severity value
pub fn validate_issue_severity(severity: &str) -> Result<(), String> {
    if !ISSUE_SEVERITIES.contains(&severity) {
        return Err(format!(
            "Invalid severity. Must be one of: {}",
            ISSUE_SEVERITIES.join(", ")
        ));
    }
    Ok(())
}

/// Validate a subsidy application status value
pub fn validate_subsidy_status(status: &str) -> Result<(), String> {
    if !SUBSIDY_STATUSES.contains(&status) {
        return Err("Invalid status value".to_string());
    }
    Ok(())
}

/// Validate a disease-detection severity value
pub fn validate_detection_severity(severity: &str) -> Result<(), String> {
    if !DETECTION_SEVERITIES.contains(&severity) {
        return Err(format!(
            "Invalid severity. Must be one of: {}",
            DETECTION_SEVERITIES.join(", ")
        ));
    }
    Ok(())
}

/// Validate a chat message sender tag
pub fn validate_message_sender(sender: &str) -> Result<(), String> {
    if !MESSAGE_SENDERS.contains(&sender) {
        return Err("Sender must be 'user' or 'bot'".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("farmer@example.com").is_ok());
        assert!(validate_email("a.b+c@example.co.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("missing@tld").is_err());
        assert!(validate_email("two words@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("hunter2x").is_ok());

        assert!(validate_password("").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Rice", "cropType").is_ok());
        assert!(validate_required("", "cropType").is_err());
        assert!(validate_required("   ", "cropType").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000", "session_id").is_ok());
        assert!(validate_uuid("", "session_id").is_err());
        assert!(validate_uuid("not-a-uuid", "session_id").is_err());
    }

    #[test]
    fn test_validate_issue_status() {
        assert!(validate_issue_status("open").is_ok());
        assert!(validate_issue_status("in_progress").is_ok());
        assert!(validate_issue_status("resolved").is_ok());

        assert!(validate_issue_status("closed").is_err());
        assert!(validate_issue_status("OPEN").is_err());
        assert!(validate_issue_status("").is_err());
    }

    #[test]
    fn test_validate_issue_severity() {
        assert!(validate_issue_severity("low").is_ok());
        assert!(validate_issue_severity("medium").is_ok());
        assert!(validate_issue_severity("high").is_ok());
        assert!(validate_issue_severity("critical").is_err());
    }

    #[test]
    fn test_validate_subsidy_status() {
        assert!(validate_subsidy_status("pending").is_ok());
        assert!(validate_subsidy_status("approved").is_ok());
        assert!(validate_subsidy_status("rejected").is_ok());
        assert!(validate_subsidy_status("granted").is_err());
    }

    #[test]
    fn test_validate_detection_severity() {
        assert!(validate_detection_severity("Healthy").is_ok());
        assert!(validate_detection_severity("None").is_ok());
        assert!(validate_detection_severity("Severe").is_ok());
        assert!(validate_detection_severity("severe").is_err());
        assert!(validate_detection_severity("Critical").is_err());
    }

    #[test]
    fn test_validate_message_sender() {
        assert!(validate_message_sender("user").is_ok());
        assert!(validate_message_sender("bot").is_ok());
        assert!(validate_message_sender("admin").is_err());
        assert!(validate_message_sender("").is_err());
    }
}
