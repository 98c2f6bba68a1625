// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use lastword_config::model::StorageConfig;
use lastword_core::{
    AdapterType, ChannelKind, ClaimRequest, DeliveryLogRecord, EntryDraft, EntryStats,
    EntryStatus, HealthStatus, LastwordError, MessageRecord, Owner, PluginAdapter,
    RegenerateOutcome, ScheduleEntry, SentRecord, StorageAdapter, TriggerCondition,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, LastwordError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    pub fn db(&self) -> Result<&Database, LastwordError> {
        self.db.get().ok_or_else(|| LastwordError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(db: &Database) -> Result<(), LastwordError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LastwordError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let result = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match result {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), LastwordError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LastwordError> {
        let db = Database::open_with(&self.config).await?;
        self.db.set(db).map_err(|_| LastwordError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LastwordError> {
        Self::checkpoint(self.db()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Conditions ---

    async fn insert_condition(&self, condition: &TriggerCondition) -> Result<(), LastwordError> {
        queries::conditions::insert_condition(self.db()?, condition).await
    }

    async fn update_condition(&self, condition: &TriggerCondition) -> Result<(), LastwordError> {
        queries::conditions::update_condition(self.db()?, condition).await
    }

    async fn get_condition(&self, id: &str) -> Result<Option<TriggerCondition>, LastwordError> {
        queries::conditions::get_condition(self.db()?, id).await
    }

    async fn active_condition_for_message(
        &self,
        message_id: &str,
    ) -> Result<Option<TriggerCondition>, LastwordError> {
        queries::conditions::active_condition_for_message(self.db()?, message_id).await
    }

    async fn active_panic_conditions(
        &self,
        user_id: &str,
    ) -> Result<Vec<TriggerCondition>, LastwordError> {
        queries::conditions::active_panic_conditions(self.db()?, user_id).await
    }

    async fn active_check_in_conditions(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<TriggerCondition>, LastwordError> {
        queries::conditions::active_check_in_conditions(self.db()?, user_id).await
    }

    async fn activate_condition(
        &self,
        condition_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError> {
        queries::conditions::activate_condition(self.db()?, condition_id, now).await
    }

    async fn deactivate_condition(
        &self,
        condition_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError> {
        queries::conditions::deactivate_condition(self.db()?, condition_id, now).await
    }

    // --- Messages and owners ---

    async fn get_message(&self, id: &str) -> Result<Option<MessageRecord>, LastwordError> {
        queries::directory::get_message(self.db()?, id).await
    }

    async fn upsert_message(&self, message: &MessageRecord) -> Result<(), LastwordError> {
        queries::directory::upsert_message(self.db()?, message).await
    }

    async fn get_owner(&self, user_id: &str) -> Result<Option<Owner>, LastwordError> {
        queries::directory::get_owner(self.db()?, user_id).await
    }

    async fn upsert_owner(&self, owner: &Owner) -> Result<(), LastwordError> {
        queries::directory::upsert_owner(self.db()?, owner).await
    }

    // --- Schedule ---

    async fn replace_pending_entries(
        &self,
        message_id: &str,
        condition_id: &str,
        drafts: &[EntryDraft],
        now: DateTime<Utc>,
    ) -> Result<RegenerateOutcome, LastwordError> {
        queries::schedule::replace_pending_entries(self.db()?, message_id, condition_id, drafts, now)
            .await
    }

    async fn insert_entries_if_absent(
        &self,
        drafts: &[EntryDraft],
        now: DateTime<Utc>,
    ) -> Result<usize, LastwordError> {
        queries::schedule::insert_entries_if_absent(self.db()?, drafts, now).await
    }

    async fn obsolete_pending_entries(
        &self,
        message_id: &str,
        condition_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<usize, LastwordError> {
        queries::schedule::obsolete_pending_entries(self.db()?, message_id, condition_id, now).await
    }

    async fn claim_due_entries(
        &self,
        request: &ClaimRequest,
    ) -> Result<Vec<ScheduleEntry>, LastwordError> {
        queries::schedule::claim_due_entries(self.db()?, request).await
    }

    async fn mark_entry_sent(&self, id: i64, now: DateTime<Utc>) -> Result<(), LastwordError> {
        queries::schedule::mark_entry_sent(self.db()?, id, now).await
    }

    async fn record_entry_failure(
        &self,
        id: i64,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Result<EntryStatus, LastwordError> {
        queries::schedule::record_entry_failure(self.db()?, id, max_retries, now).await
    }

    async fn mark_entry_failed(&self, id: i64, now: DateTime<Utc>) -> Result<(), LastwordError> {
        queries::schedule::mark_entry_failed(self.db()?, id, now).await
    }

    async fn release_entry(&self, id: i64, now: DateTime<Utc>) -> Result<(), LastwordError> {
        queries::schedule::release_entry(self.db()?, id, now).await
    }

    async fn mark_entry_obsolete(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError> {
        queries::schedule::mark_entry_obsolete(self.db()?, id, now).await
    }

    async fn reset_stuck_entries(
        &self,
        older_than: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize, LastwordError> {
        queries::schedule::reset_stuck_entries(self.db()?, older_than, now).await
    }

    async fn get_entry(&self, id: i64) -> Result<Option<ScheduleEntry>, LastwordError> {
        queries::schedule::get_entry(self.db()?, id).await
    }

    async fn list_entries(&self, message_id: &str) -> Result<Vec<ScheduleEntry>, LastwordError> {
        queries::schedule::list_entries(self.db()?, message_id).await
    }

    async fn entry_stats(
        &self,
        now: DateTime<Utc>,
        recent_since: DateTime<Utc>,
    ) -> Result<EntryStats, LastwordError> {
        queries::schedule::entry_stats(self.db()?, now, recent_since).await
    }

    // --- Delivery log ---

    async fn append_delivery_log(&self, record: &DeliveryLogRecord) -> Result<(), LastwordError> {
        queries::delivery_log::append_delivery_log(self.db()?, record).await
    }

    async fn recent_successful_attempt(
        &self,
        entry_id: i64,
        recipient: &str,
        channel: ChannelKind,
        since: DateTime<Utc>,
    ) -> Result<bool, LastwordError> {
        queries::delivery_log::recent_successful_attempt(
            self.db()?,
            entry_id,
            recipient,
            channel,
            since,
        )
        .await
    }

    async fn delivery_log_for_entry(
        &self,
        entry_id: i64,
    ) -> Result<Vec<DeliveryLogRecord>, LastwordError> {
        queries::delivery_log::delivery_log_for_entry(self.db()?, entry_id).await
    }

    // --- Sent ledger ---

    async fn append_sent_record(&self, record: &SentRecord) -> Result<bool, LastwordError> {
        queries::sent_records::append_sent_record(self.db()?, record).await
    }

    async fn has_sent_record(
        &self,
        message_id: &str,
        condition_id: &str,
        deadline: DateTime<Utc>,
    ) -> Result<bool, LastwordError> {
        queries::sent_records::has_sent_record(self.db()?, message_id, condition_id, deadline).await
    }
}
