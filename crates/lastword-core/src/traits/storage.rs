// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable schedule store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::condition::TriggerCondition;
use crate::delivery::{ChannelKind, DeliveryLogRecord, MessageRecord, Owner, SentRecord};
use crate::error::LastwordError;
use crate::schedule::{
    ClaimRequest, EntryDraft, EntryStats, EntryStatus, RegenerateOutcome, ScheduleEntry,
};
use crate::traits::adapter::PluginAdapter;

/// Adapter for the persistence backend.
///
/// Besides lifecycle, the store owns the two invariants the engine depends
/// on: claims are atomic across connections, and at most one non-obsolete
/// entry exists per (message, condition, scheduled_at, kind).
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, pragmas).
    async fn initialize(&self) -> Result<(), LastwordError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LastwordError>;

    // --- Conditions ---

    async fn insert_condition(&self, condition: &TriggerCondition) -> Result<(), LastwordError>;

    async fn update_condition(&self, condition: &TriggerCondition) -> Result<(), LastwordError>;

    async fn get_condition(&self, id: &str) -> Result<Option<TriggerCondition>, LastwordError>;

    async fn active_condition_for_message(
        &self,
        message_id: &str,
    ) -> Result<Option<TriggerCondition>, LastwordError>;

    async fn active_panic_conditions(
        &self,
        user_id: &str,
    ) -> Result<Vec<TriggerCondition>, LastwordError>;

    /// Active check-in conditions, optionally for a single owner.
    async fn active_check_in_conditions(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<TriggerCondition>, LastwordError>;

    /// Make `condition_id` the only active condition of its message.
    async fn activate_condition(
        &self,
        condition_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError>;

    async fn deactivate_condition(
        &self,
        condition_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError>;

    // --- Messages and owners ---

    async fn get_message(&self, id: &str) -> Result<Option<MessageRecord>, LastwordError>;

    async fn upsert_message(&self, message: &MessageRecord) -> Result<(), LastwordError>;

    async fn get_owner(&self, user_id: &str) -> Result<Option<Owner>, LastwordError>;

    async fn upsert_owner(&self, owner: &Owner) -> Result<(), LastwordError>;

    // --- Schedule ---

    /// Obsolete the pending entries of (message, condition) and insert
    /// `drafts` with insert-or-ignore, in one transaction.
    async fn replace_pending_entries(
        &self,
        message_id: &str,
        condition_id: &str,
        drafts: &[EntryDraft],
        now: DateTime<Utc>,
    ) -> Result<RegenerateOutcome, LastwordError>;

    /// Insert-or-ignore on the dedup key. Returns the number of new rows.
    async fn insert_entries_if_absent(
        &self,
        drafts: &[EntryDraft],
        now: DateTime<Utc>,
    ) -> Result<usize, LastwordError>;

    /// Obsolete every pending entry of a message (all conditions when
    /// `condition_id` is `None`).
    async fn obsolete_pending_entries(
        &self,
        message_id: &str,
        condition_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize, LastwordError>;

    /// Atomically move up to `limit` pending rows to `processing`.
    async fn claim_due_entries(
        &self,
        request: &ClaimRequest,
    ) -> Result<Vec<ScheduleEntry>, LastwordError>;

    async fn mark_entry_sent(&self, id: i64, now: DateTime<Utc>) -> Result<(), LastwordError>;

    /// Increment the retry count and return the row to `pending`, or mark it
    /// `failed` once `max_retries` is reached. Returns the new status.
    async fn record_entry_failure(
        &self,
        id: i64,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<EntryStatus, LastwordError>;

    /// Mark `failed` without consuming retries.
    async fn mark_entry_failed(&self, id: i64, now: DateTime<Utc>) -> Result<(), LastwordError>;

    /// Return a claimed row to `pending` untouched (claimed before it was due).
    async fn release_entry(&self, id: i64, now: DateTime<Utc>) -> Result<(), LastwordError>;

    async fn mark_entry_obsolete(&self, id: i64, now: DateTime<Utc>)
    -> Result<(), LastwordError>;

    /// Reset `processing` rows whose last attempt predates `older_than`.
    async fn reset_stuck_entries(
        &self,
        older_than: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, LastwordError>;

    async fn get_entry(&self, id: i64) -> Result<Option<ScheduleEntry>, LastwordError>;

    async fn list_entries(&self, message_id: &str) -> Result<Vec<ScheduleEntry>, LastwordError>;

    async fn entry_stats(
        &self,
        now: DateTime<Utc>,
        recent_since: DateTime<Utc>,
    ) -> Result<EntryStats, LastwordError>;

    // --- Delivery log ---

    async fn append_delivery_log(&self, record: &DeliveryLogRecord) -> Result<(), LastwordError>;

    /// Whether a `sent` attempt for this (entry, recipient, channel) exists
    /// at or after `since`.
    async fn recent_successful_attempt(
        &self,
        entry_id: i64,
        recipient: &str,
        channel: ChannelKind,
        since: DateTime<Utc>,
    ) -> Result<bool, LastwordError>;

    async fn delivery_log_for_entry(
        &self,
        entry_id: i64,
    ) -> Result<Vec<DeliveryLogRecord>, LastwordError>;

    // --- Sent ledger ---

    /// Append a ledger row. Returns `false` if the key was already recorded.
    async fn append_sent_record(&self, record: &SentRecord) -> Result<bool, LastwordError>;

    async fn has_sent_record(
        &self,
        message_id: &str,
        condition_id: &str,
        deadline: DateTime<Utc>,
    ) -> Result<bool, LastwordError>;
}
