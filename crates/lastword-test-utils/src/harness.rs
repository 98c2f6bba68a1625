// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end scheduling tests.
//!
//! `TestHarness` assembles a complete engine with mock channels, a temp
//! SQLite database and a manual clock. Tests move time with
//! [`TestHarness::advance`] and run cycles with [`TestHarness::process`].

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use lastword_config::model::{LastwordConfig, StorageConfig};
use lastword_core::{
    CheckInWindow, Clock, ConditionKind, EmailChannel, LastwordError, ManualClock, MessageRecord,
    MessagingChannel, Owner, PanicConfig, Recipient, ScheduleEntry, StorageAdapter,
    TriggerCondition,
};
use lastword_scheduler::{Channels, Engine, EngineSettings, ProcessRequest, ProcessSummary};
use lastword_storage::SqliteStorage;

use crate::mock_channel::{MockEmailChannel, MockMessagingChannel};

/// Owner id used by the seed helpers.
pub const OWNER_ID: &str = "owner-1";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: LastwordConfig,
    start: DateTime<Utc>,
    with_email: bool,
    with_messaging: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: LastwordConfig::default(),
            start: Utc
                .with_ymd_and_hms(2026, 5, 1, 8, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            with_email: true,
            with_messaging: true,
        }
    }

    /// Start the manual clock at `start`.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Replace the configuration the engine settings are derived from.
    pub fn with_config(mut self, config: LastwordConfig) -> Self {
        self.config = config;
        self
    }

    /// Leave the messaging channel unconfigured.
    pub fn without_messaging(mut self) -> Self {
        self.with_messaging = false;
        self
    }

    /// Leave the email channel unconfigured.
    pub fn without_email(mut self) -> Self {
        self.with_email = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, LastwordError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| LastwordError::Storage { source: e.into() })?;
        let storage_config = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            ..self.config.storage.clone()
        };
        let storage: Arc<dyn StorageAdapter + Send + Sync> =
            Arc::new(SqliteStorage::open(storage_config).await?);

        let clock = Arc::new(ManualClock::new(self.start));
        let email = Arc::new(MockEmailChannel::new());
        let messaging = Arc::new(MockMessagingChannel::new());
        let mut channels = Channels::default();
        if self.with_email {
            let channel: Arc<dyn EmailChannel + Send + Sync> = email.clone();
            channels.email = Some(channel);
        }
        if self.with_messaging {
            let channel: Arc<dyn MessagingChannel + Send + Sync> = messaging.clone();
            channels.messaging = Some(channel);
        }

        let engine = Engine::new(
            storage.clone(),
            channels,
            clock.clone(),
            EngineSettings::from_config(&self.config),
        );

        Ok(TestHarness {
            engine: Arc::new(engine),
            storage,
            clock,
            email,
            messaging,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock channels and temp storage.
pub struct TestHarness {
    pub engine: Arc<Engine>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub clock: Arc<ManualClock>,
    pub email: Arc<MockEmailChannel>,
    pub messaging: Arc<MockMessagingChannel>,
    pub config: LastwordConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Run one ordinary processing cycle.
    pub async fn process(&self) -> Result<ProcessSummary, LastwordError> {
        self.engine
            .process(ProcessRequest {
                debug: true,
                ..ProcessRequest::default()
            })
            .await
    }

    pub async fn process_with(
        &self,
        request: ProcessRequest,
    ) -> Result<ProcessSummary, LastwordError> {
        self.engine.process(request).await
    }

    /// Insert the owner row and a message with the given id.
    pub async fn seed_message(&self, message_id: &str) -> Result<(), LastwordError> {
        self.storage
            .upsert_owner(&Owner {
                user_id: OWNER_ID.to_string(),
                name: "Olive".to_string(),
                email: Some("owner@example.com".to_string()),
                phone: Some("+15550001000".to_string()),
            })
            .await?;
        self.storage
            .upsert_message(&MessageRecord {
                id: message_id.to_string(),
                user_id: OWNER_ID.to_string(),
                title: format!("Letter {message_id}"),
                body: "If you are reading this, I did not check in.".to_string(),
            })
            .await
    }

    /// Create and arm a `no_check_in` condition for `message_id`.
    pub async fn arm_check_in(
        &self,
        message_id: &str,
        hours: u32,
        reminders: Vec<u32>,
    ) -> Result<TriggerCondition, LastwordError> {
        self.seed_message(message_id).await?;
        let mut condition = TriggerCondition::new(
            message_id,
            OWNER_ID,
            ConditionKind::NoCheckIn(CheckInWindow::new(hours, 0)),
            self.now(),
        )
        .with_reminders(reminders)
        .with_recipients(vec![default_recipient()]);
        condition.active = true;
        self.engine.create_condition(condition).await
    }

    /// Create and arm a panic condition for `message_id`.
    pub async fn arm_panic(
        &self,
        message_id: &str,
        panic: PanicConfig,
    ) -> Result<TriggerCondition, LastwordError> {
        self.seed_message(message_id).await?;
        let mut condition = TriggerCondition::new(
            message_id,
            OWNER_ID,
            ConditionKind::PanicTrigger(panic),
            self.now(),
        )
        .with_recipients(vec![default_recipient()]);
        condition.active = true;
        self.engine.create_condition(condition).await
    }

    pub async fn entries(&self, message_id: &str) -> Result<Vec<ScheduleEntry>, LastwordError> {
        self.storage.list_entries(message_id).await
    }
}

/// Recipient reachable over both channels.
pub fn default_recipient() -> Recipient {
    Recipient {
        id: "r1".to_string(),
        name: "Rae".to_string(),
        email: Some("rae@example.com".to_string()),
        phone: Some("+15550002222".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lastword_core::{EntryKind, EntryStatus};

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        let summary = harness.process().await.unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn arming_generates_a_schedule() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.arm_check_in("m1", 24, vec![60]).await.unwrap();

        let entries = harness.entries("m1").await.unwrap();
        let kinds: Vec<EntryKind> = entries.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EntryKind::Reminder));
        assert!(kinds.contains(&EntryKind::FinalDelivery));
        assert!(entries.iter().all(|e| e.status == EntryStatus::Pending));
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();

        h1.arm_check_in("m1", 24, vec![]).await.unwrap();
        assert!(!h1.entries("m1").await.unwrap().is_empty());
        assert!(h2.entries("m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn advancing_the_clock_makes_entries_due() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.arm_check_in("m1", 2, vec![]).await.unwrap();

        assert_eq!(harness.process().await.unwrap().processed, 0);
        harness.advance(Duration::hours(2));
        let summary = harness.process().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(harness.email.sent_to("rae@example.com").await.len(), 1);
        assert_eq!(harness.messaging.sent_to("+15550002222").await.len(), 1);
    }
}
