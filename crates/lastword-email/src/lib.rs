// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP email channel.
//!
//! Sends HTML email through an authenticated STARTTLS relay using `lettre`'s
//! pooled async transport. The transport is built once at startup and
//! shared by every dispatch.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use lastword_config::model::EmailConfig;
use lastword_core::{
    AdapterType, ChannelReceipt, EmailChannel, HealthStatus, LastwordError, OutboundEmail,
    PluginAdapter,
};

pub struct SmtpEmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpEmailChannel {
    /// Build the channel from config. Fails when no relay host or sender is set.
    pub fn from_config(config: &EmailConfig) -> Result<Self, LastwordError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| LastwordError::Config("email.smtp_host is not set".to_string()))?;
        let from = config
            .from_address
            .as_deref()
            .ok_or_else(|| LastwordError::Config("email.from_address is not set".to_string()))?
            .parse::<Mailbox>()
            .map_err(|e| LastwordError::Config(format!("invalid email.from_address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| LastwordError::Config(format!("invalid SMTP relay `{host}`: {e}")))?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(host, port = config.smtp_port, "SMTP email channel configured");
        Ok(Self {
            transport: builder.build(),
            from,
            host: host.to_string(),
        })
    }
}

/// Build the MIME message for one outbound email.
pub fn build_message(from: &Mailbox, email: &OutboundEmail) -> Result<Message, LastwordError> {
    let to = email
        .to
        .parse::<Mailbox>()
        .map_err(|e| LastwordError::InvalidInput(format!("invalid recipient `{}`: {e}", email.to)))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .map_err(|e| LastwordError::channel(format!("failed to build email: {e}")))
}

#[async_trait]
impl PluginAdapter for SmtpEmailChannel {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Email
    }

    async fn health_check(&self) -> Result<HealthStatus, LastwordError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded(format!(
                "SMTP relay {} did not accept NOOP",
                self.host
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "SMTP relay {} unreachable: {e}",
                self.host
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), LastwordError> {
        Ok(())
    }
}

#[async_trait]
impl EmailChannel for SmtpEmailChannel {
    async fn send(&self, email: OutboundEmail) -> Result<ChannelReceipt, LastwordError> {
        let message = build_message(&self.from, &email)?;
        let response = self.transport.send(message).await.map_err(|e| {
            LastwordError::Channel {
                message: format!("SMTP send to {} failed: {e}", email.to),
                source: Some(Box::new(e)),
            }
        })?;

        let code = response.code().to_string();
        let lines: Vec<&str> = response.message().collect();
        debug!(to = %email.to, %code, "email accepted by relay");
        Ok(ChannelReceipt {
            id: lines.first().map(|l| l.to_string()),
            response: Some(serde_json::json!({ "code": code, "message": lines })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Mailbox {
        "Lastword <noreply@example.com>".parse().unwrap()
    }

    fn outbound(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "A message from Olive".to_string(),
            html: "<p>Hello</p>".to_string(),
        }
    }

    #[test]
    fn message_carries_subject_and_html_body() {
        let message = build_message(&sender(), &outbound("rae@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: A message from Olive"));
        assert!(raw.contains("To: rae@example.com"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("<p>Hello</p>"));
    }

    #[test]
    fn invalid_recipient_is_rejected_before_sending() {
        let err = build_message(&sender(), &outbound("not an address")).unwrap_err();
        assert!(matches!(err, LastwordError::InvalidInput(_)));
    }

    #[test]
    fn missing_host_is_a_config_error() {
        let err = SmtpEmailChannel::from_config(&EmailConfig::default())
            .err()
            .expect("no host configured");
        assert!(matches!(err, LastwordError::Config(_)));
    }

    #[tokio::test]
    async fn configured_channel_reports_identity() {
        let config = EmailConfig {
            smtp_host: Some("smtp.example.com".into()),
            from_address: Some("Lastword <noreply@example.com>".into()),
            smtp_username: Some("user".into()),
            smtp_password: Some("pass".into()),
            ..EmailConfig::default()
        };
        let channel = SmtpEmailChannel::from_config(&config).unwrap();
        assert_eq!(channel.name(), "smtp");
        assert_eq!(channel.adapter_type(), AdapterType::Email);
    }
}
