// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits: adapter identity, health, and
//! the payloads exchanged with delivery channels.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Email,
    Messaging,
}

/// An email to be sent through an [`EmailChannel`](crate::traits::EmailChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// A text message to be sent through a
/// [`MessagingChannel`](crate::traits::MessagingChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundText {
    /// Recipient phone number in E.164 form.
    pub to: String,
    /// Plain-text body.
    pub text: String,
}

/// Acknowledgement returned by a channel after a successful send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelReceipt {
    /// Provider-assigned identifier of the sent message, if any.
    pub id: Option<String>,
    /// Raw provider response kept for the delivery log.
    pub response: Option<serde_json::Value>,
}

impl ChannelReceipt {
    /// Receipt carrying only a provider message id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            response: None,
        }
    }
}
