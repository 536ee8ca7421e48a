//! System email service for sending password-reset codes.
//!
//! Uses the SMTP configuration from the main config file. Send failures are
//! surfaced to the caller; there is no retry.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

/// Service for sending system emails
pub struct SystemEmailService {
    config: MailConfig,
}

impl SystemEmailService {
    /// Create a new system email service
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a password-reset code to a farmer
    pub async fn send_reset_otp(
        &self,
        to_email: &str,
        farmer_name: &str,
        otp: &str,
        valid_minutes: i64,
    ) -> Result<()> {
        let name = if farmer_name.is_empty() {
            "Farmer"
        } else {
            farmer_name
        };

        let subject = format!("Your {} code for password reset", self.config.from_name);

        let html_body = format!(
            "<p>Hi {},</p>\
             <p>Your code to reset your password is: <strong>{}</strong></p>\
             <p>This code is valid for {} minutes. If you didn't request this, please ignore.</p>",
            name, otp, valid_minutes
        );

        let text_body = format!(
            "Hi {},\n\nYour code to reset your password is: {}\n\n\
             This code is valid for {} minutes. If you didn't request this, please ignore.\n",
            name, otp, valid_minutes
        );

        self.send_email(to_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        // Build the from mailbox with name
        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        // Build SMTP transport
        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::debug!("Sent email to {}: {}", to_email, subject);
        Ok(())
    }
}
