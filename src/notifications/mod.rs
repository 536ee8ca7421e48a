//! Outbound notifications. Currently mail only: one-time password-reset
//! codes dispatched over SMTP.

mod email;

pub use email::SystemEmailService;
