// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule entries: one row per reminder, final notice or final delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a schedule entry delivers and to whom it is routed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Reminder,
    FinalNotice,
    FinalDelivery,
}

impl EntryKind {
    /// Claim ordering weight. Higher values are claimed first among due rows.
    pub fn default_priority(&self) -> i32 {
        match self {
            EntryKind::FinalDelivery => 10,
            EntryKind::FinalNotice => 5,
            EntryKind::Reminder => 1,
        }
    }
}

/// Entry lifecycle: `pending -> processing -> {sent | failed | obsolete}`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Processing,
    Sent,
    Failed,
    Obsolete,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Sent | EntryStatus::Failed | EntryStatus::Obsolete
        )
    }
}

/// A persisted schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    pub message_id: String,
    pub condition_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub status: EntryStatus,
    pub delivery_priority: i32,
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }
}

/// An entry computed by the generator but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub message_id: String,
    pub condition_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub delivery_priority: i32,
}

impl EntryDraft {
    pub fn new(
        message_id: impl Into<String>,
        condition_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        kind: EntryKind,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            condition_id: condition_id.into(),
            scheduled_at,
            kind,
            delivery_priority: kind.default_priority(),
        }
    }

    /// The dedup key: at most one non-obsolete row exists per key.
    pub fn dedup_key(&self) -> (&str, &str, DateTime<Utc>, EntryKind) {
        (
            &self.message_id,
            &self.condition_id,
            self.scheduled_at,
            self.kind,
        )
    }
}

/// Parameters for one atomic claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub limit: usize,
    /// Restrict the claim to one message.
    pub message_id: Option<String>,
    /// Ignore `scheduled_at`; still only claims `pending` rows.
    pub force_send: bool,
    /// Restrict the claim to the row carrying this draft's dedup key.
    pub draft: Option<EntryDraft>,
    pub now: DateTime<Utc>,
}

impl ClaimRequest {
    pub fn due(limit: usize, now: DateTime<Utc>) -> Self {
        Self {
            limit,
            message_id: None,
            force_send: false,
            draft: None,
            now,
        }
    }

    /// Claim exactly the entry persisted for `draft`, whenever it is scheduled.
    pub fn for_draft(draft: &EntryDraft, now: DateTime<Utc>) -> Self {
        Self {
            limit: 1,
            message_id: Some(draft.message_id.clone()),
            force_send: true,
            draft: Some(draft.clone()),
            now,
        }
    }

    pub fn for_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn forced(mut self, force_send: bool) -> Self {
        self.force_send = force_send;
        self
    }
}

/// Counts returned by a schedule regeneration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerateOutcome {
    pub obsoleted: usize,
    pub inserted: usize,
}

/// Observability snapshot over the schedule table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStats {
    pub due_count: u64,
    pub processing_count: u64,
    pub sent_recent: u64,
    pub failed_recent: u64,
}
