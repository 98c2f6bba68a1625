// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery audit records and the external records the dispatcher reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::condition::Location;

/// Transport used for a single delivery attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Messaging,
    /// No channel was attempted (e.g. nobody to send to).
    None,
}

/// Outcome of a single (recipient, channel) attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    /// Already sent within the idempotency window; not re-sent.
    Skipped,
}

/// Append-only audit row. `id` is `None` until persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLogRecord {
    pub id: Option<i64>,
    pub entry_id: i64,
    pub message_id: String,
    pub condition_id: String,
    pub recipient: String,
    pub channel: ChannelKind,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row for a completed final delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentRecord {
    pub message_id: String,
    pub condition_id: String,
    pub user_id: String,
    pub deadline: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
}

/// The person who owns a message and must check in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Message content as written by the external CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
}

/// Inbound emergency signal from an owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanicSignal {
    pub user_id: String,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl PanicSignal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            keyword: None,
            location: None,
        }
    }
}
