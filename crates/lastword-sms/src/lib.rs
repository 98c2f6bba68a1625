// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Twilio messaging channel for SMS and WhatsApp.
//!
//! Posts to the Twilio Messages REST resource with HTTP basic auth. In
//! WhatsApp mode both numbers carry the `whatsapp:` address prefix.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use lastword_config::model::SmsConfig;
use lastword_core::{
    AdapterType, ChannelReceipt, HealthStatus, LastwordError, MessagingChannel, OutboundText,
    PluginAdapter,
};

/// Twilio rejects bodies longer than this.
const MAX_BODY_CHARS: usize = 1600;

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioChannel {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    whatsapp: bool,
    api_base: String,
}

impl TwilioChannel {
    /// Build the channel from config. Fails when credentials are incomplete.
    pub fn from_config(config: &SmsConfig) -> Result<Self, LastwordError> {
        let (Some(account_sid), Some(auth_token), Some(from_number)) = (
            config.account_sid.clone(),
            config.auth_token.clone(),
            config.from_number.clone(),
        ) else {
            return Err(LastwordError::Config(
                "sms.account_sid, sms.auth_token and sms.from_number are required".to_string(),
            ));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LastwordError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            account_sid,
            auth_token,
            from_number,
            whatsapp: config.whatsapp,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    fn address(&self, number: &str) -> String {
        let number = number.trim();
        if self.whatsapp && !number.starts_with("whatsapp:") {
            format!("whatsapp:{number}")
        } else {
            number.to_string()
        }
    }
}

fn truncate_body(text: &str) -> String {
    if text.chars().count() <= MAX_BODY_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_BODY_CHARS - 1).collect();
    out.push('…');
    out
}

#[async_trait]
impl PluginAdapter for TwilioChannel {
    fn name(&self) -> &str {
        if self.whatsapp { "twilio-whatsapp" } else { "twilio-sms" }
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messaging
    }

    async fn health_check(&self) -> Result<HealthStatus, LastwordError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}.json",
            self.api_base, self.account_sid
        );
        match self
            .client
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Degraded(format!(
                "Twilio account lookup returned {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("Twilio unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), LastwordError> {
        Ok(())
    }
}

#[async_trait]
impl MessagingChannel for TwilioChannel {
    async fn send(&self, text: OutboundText) -> Result<ChannelReceipt, LastwordError> {
        let form = [
            ("To", self.address(&text.to)),
            ("From", self.address(&self.from_number)),
            ("Body", truncate_body(&text.text)),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| LastwordError::Channel {
                message: format!("Twilio request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiError>(&body)
                .ok()
                .map(|e| {
                    format!(
                        "{} (code {})",
                        e.message.unwrap_or_default(),
                        e.code.map(|c| c.to_string()).unwrap_or_else(|| "-".into())
                    )
                })
                .unwrap_or(body);
            warn!(%status, to = %text.to, "Twilio rejected message");
            return Err(LastwordError::channel(format!(
                "Twilio returned {status}: {detail}"
            )));
        }

        let resource: MessageResource = serde_json::from_str(&body).map_err(|e| {
            LastwordError::Channel {
                message: format!("unexpected Twilio response: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        debug!(sid = %resource.sid, status = ?resource.status, "message queued by Twilio");
        Ok(ChannelReceipt {
            id: Some(resource.sid.clone()),
            response: serde_json::from_str(&body).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str, whatsapp: bool) -> SmsConfig {
        SmsConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from_number: Some("+15550001111".into()),
            whatsapp,
            api_base: base.to_string(),
        }
    }

    fn text(to: &str) -> OutboundText {
        OutboundText {
            to: to.to_string(),
            text: "Check in before 09:00".to_string(),
        }
    }

    #[tokio::test]
    async fn send_posts_form_and_returns_sid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15550002222"))
            .and(body_string_contains("From=%2B15550001111"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"sid": "SM1", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let channel = TwilioChannel::from_config(&config(&server.uri(), false)).unwrap();
        let receipt = channel.send(text("+15550002222")).await.unwrap();
        assert_eq!(receipt.id.as_deref(), Some("SM1"));
        assert_eq!(receipt.response.unwrap()["status"], "queued");
    }

    #[tokio::test]
    async fn whatsapp_mode_prefixes_both_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("To=whatsapp%3A%2B15550002222"))
            .and(body_string_contains("From=whatsapp%3A%2B15550001111"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"sid": "SM2"})))
            .expect(1)
            .mount(&server)
            .await;

        let channel = TwilioChannel::from_config(&config(&server.uri(), true)).unwrap();
        assert_eq!(channel.name(), "twilio-whatsapp");
        channel.send(text("+15550002222")).await.unwrap();
    }

    #[tokio::test]
    async fn api_error_surfaces_as_channel_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let channel = TwilioChannel::from_config(&config(&server.uri(), false)).unwrap();
        let err = channel.send(text("nope")).await.unwrap_err();
        assert!(err.is_transient());
        let msg = err.to_string();
        assert!(msg.contains("400"), "got: {msg}");
        assert!(msg.contains("21211"), "got: {msg}");
    }

    #[tokio::test]
    async fn health_check_reports_account_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC123.json"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let channel = TwilioChannel::from_config(&config(&server.uri(), false)).unwrap();
        assert!(matches!(
            channel.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }

    #[test]
    fn incomplete_credentials_are_rejected() {
        let mut cfg = config("https://api.twilio.com", false);
        cfg.auth_token = None;
        assert!(matches!(
            TwilioChannel::from_config(&cfg),
            Err(LastwordError::Config(_))
        ));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = "x".repeat(2000);
        let out = truncate_body(&long);
        assert_eq!(out.chars().count(), MAX_BODY_CHARS);
        assert!(out.ends_with('…'));
        assert_eq!(truncate_body("short"), "short");
    }
}
