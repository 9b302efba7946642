//! Email delivery of invite notifications.
//!
//! Supports two providers:
//! - `console`: Logs emails instead of sending them (development)
//! - `sendgrid`: Uses the SendGrid v3 API

use crate::config::EmailConfig;
use domain::services::{InviteNotification, InviteNotifier};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Email service disabled")]
    Disabled,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Email service for invite notifications.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(subject = %message.subject, "Email service disabled, skipping send");
            return Err(EmailError::Disabled);
        }

        match self.config.provider.as_str() {
            "console" => {
                self.send_console(&message);
                Ok(())
            }
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Console provider. The body carries the access link, so only its size is logged.
    fn send_console(&self, message: &EmailMessage) {
        info!(
            to = %message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            body_text_length = message.body_text.len(),
            "Email (console provider)"
        );
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let mut content = vec![serde_json::json!({
            "type": "text/plain",
            "value": message.body_text
        })];
        if let Some(html) = &message.body_html {
            content.push(serde_json::json!({
                "type": "text/html",
                "value": html
            }));
        }

        let body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": content
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

/// Renders the invitation email for `notification`.
pub fn invite_message(notification: &InviteNotification, sender_name: &str) -> EmailMessage {
    let subject = format!(
        "{} shared \"{}\" with you",
        notification.granter_name, notification.gallery_title
    );

    let permissions = notification.capabilities.granted_names().join(", ");

    let body_text = format!(
        r#"Hi,

{granter} invited you to view the gallery "{title}".

Open it here:

{url}

You will be able to: {permissions}.

Best regards,
{sender}"#,
        granter = notification.granter_name,
        title = notification.gallery_title,
        url = notification.access_url,
        permissions = permissions,
        sender = sender_name,
    );

    let body_html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="margin-top: 0;">{granter} shared a gallery with you</h2>
    <p><strong>{title}</strong></p>
    <div style="text-align: center; margin: 30px 0;">
        <a href="{url}" style="background: #222; color: white; padding: 14px 28px; text-decoration: none; border-radius: 6px; font-weight: bold; display: inline-block;">Open gallery</a>
    </div>
    <p style="color: #666; font-size: 14px;">You will be able to: {permissions}.</p>
    <hr style="border: none; border-top: 1px solid #ddd; margin: 30px 0;">
    <p style="color: #999; font-size: 12px;">Or copy and paste this link into your browser:<br><a href="{url}">{url}</a></p>
</body>
</html>"#,
        granter = escape_html(&notification.granter_name),
        title = escape_html(&notification.gallery_title),
        url = escape_html(&notification.access_url),
        permissions = escape_html(&permissions),
    );

    EmailMessage {
        to: notification.recipient_email.clone(),
        subject,
        body_text,
        body_html: Some(body_html),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait::async_trait]
impl InviteNotifier for EmailService {
    async fn send_invite_notification(&self, notification: InviteNotification) -> bool {
        let message = invite_message(&notification, &self.config.sender_name);
        match self.send(message).await {
            Ok(()) => true,
            Err(EmailError::Disabled) => false,
            Err(e) => {
                warn!(error = %e, "Invite notification was not delivered");
                false
            }
        }
    }
}
