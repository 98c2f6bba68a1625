// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures shared by this crate's unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use lastword_config::model::StorageConfig;
use lastword_core::{
    AdapterType, ChannelReceipt, CheckInWindow, Clock, ConditionKind, EmailChannel, EntryKind,
    EntryStatus, HealthStatus, LastwordError, ManualClock, MessageRecord, MessagingChannel,
    OutboundEmail, OutboundText, Owner, PluginAdapter, Recipient, ScheduleEntry, StorageAdapter,
    TriggerCondition,
};
use lastword_storage::SqliteStorage;

use crate::deadline::StalenessPolicy;
use crate::dispatcher::{Channels, DispatchSettings, Dispatcher};
use crate::engine::{Engine, EngineSettings};
use crate::generator::ScheduleGenerator;
use crate::lifecycle::Lifecycle;
use crate::panic::PanicFlow;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
}

/// Active `no_check_in` 24h condition, checked in at `t0`, one 60 minute
/// reminder, one email recipient.
pub fn check_in_condition(id: &str, message_id: &str) -> TriggerCondition {
    let mut window = CheckInWindow::new(24, 0);
    window.last_checked_at = Some(t0());
    let mut condition =
        TriggerCondition::new(message_id, "owner-1", ConditionKind::NoCheckIn(window), t0())
            .with_reminders(vec![60])
            .with_recipients(vec![Recipient {
                id: "r1".into(),
                name: "Rae".into(),
                email: Some("rae@example.com".into()),
                phone: None,
            }]);
    condition.id = id.to_string();
    condition.active = true;
    condition
}

pub fn owner() -> Owner {
    Owner {
        user_id: "owner-1".into(),
        name: "Olive".into(),
        email: Some("owner@example.com".into()),
        phone: None,
    }
}

pub fn message(id: &str) -> MessageRecord {
    MessageRecord {
        id: id.to_string(),
        user_id: "owner-1".into(),
        title: format!("Letter {id}"),
        body: "If you are reading this, I did not check in.".into(),
    }
}

pub fn entry_for(
    condition: &TriggerCondition,
    kind: EntryKind,
    scheduled_at: DateTime<Utc>,
) -> ScheduleEntry {
    ScheduleEntry {
        id: 1,
        message_id: condition.message_id.clone(),
        condition_id: condition.id.clone(),
        scheduled_at,
        kind,
        status: EntryStatus::Processing,
        delivery_priority: kind.default_priority(),
        retry_count: 0,
        last_attempt_at: Some(scheduled_at),
        created_at: scheduled_at,
        updated_at: scheduled_at,
    }
}

pub async fn setup_storage() -> (Arc<dyn StorageAdapter + Send + Sync>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("test.db").to_string_lossy().into_owned(),
        ..StorageConfig::default()
    };
    let storage = SqliteStorage::open(config).await.unwrap();
    (Arc::new(storage), dir)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ok,
    Fail,
    Hang,
}

/// Channel double that records what it was asked to send.
pub struct Recorder<T> {
    sent: Mutex<Vec<T>>,
    mode: Mutex<(Mode, String)>,
}

impl<T: Clone> Recorder<T> {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            mode: Mutex::new((Mode::Ok, String::new())),
        }
    }

    pub fn sent(&self) -> Vec<T> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.mode.lock().unwrap() = (Mode::Fail, message.to_string());
    }

    pub fn recover(&self) {
        *self.mode.lock().unwrap() = (Mode::Ok, String::new());
    }

    pub fn hang(&self) {
        *self.mode.lock().unwrap() = (Mode::Hang, String::new());
    }

    async fn record(&self, item: T) -> Result<ChannelReceipt, LastwordError> {
        let (mode, message) = self.mode.lock().unwrap().clone();
        match mode {
            Mode::Ok => {
                let mut sent = self.sent.lock().unwrap();
                sent.push(item);
                Ok(ChannelReceipt::with_id(format!("rec-{}", sent.len())))
            }
            Mode::Fail => Err(LastwordError::channel(message)),
            Mode::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PluginAdapter for Recorder<T> {
    fn name(&self) -> &str {
        "recorder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Email
    }

    async fn health_check(&self) -> Result<HealthStatus, LastwordError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LastwordError> {
        Ok(())
    }
}

#[async_trait]
impl EmailChannel for Recorder<OutboundEmail> {
    async fn send(&self, email: OutboundEmail) -> Result<ChannelReceipt, LastwordError> {
        self.record(email).await
    }
}

#[async_trait]
impl MessagingChannel for Recorder<OutboundText> {
    async fn send(&self, text: OutboundText) -> Result<ChannelReceipt, LastwordError> {
        self.record(text).await
    }
}

pub struct Fixture {
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub clock: Arc<ManualClock>,
    pub email: Arc<Recorder<OutboundEmail>>,
    pub messaging: Arc<Recorder<OutboundText>>,
    _dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let (storage, dir) = setup_storage().await;
        Self {
            storage,
            clock: Arc::new(ManualClock::new(t0())),
            email: Arc::new(Recorder::new()),
            messaging: Arc::new(Recorder::new()),
            _dir: dir,
        }
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn channels(&self) -> Channels {
        Channels {
            email: Some(self.email.clone()),
            messaging: Some(self.messaging.clone()),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.storage.clone(),
            self.channels(),
            self.clock(),
            ScheduleGenerator::default(),
            DispatchSettings::default(),
        )
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new(
            self.storage.clone(),
            self.clock(),
            ScheduleGenerator::new(StalenessPolicy::lead_time(), None),
        )
    }

    pub fn panic_flow(&self) -> PanicFlow {
        PanicFlow::new(
            self.storage.clone(),
            self.clock(),
            Arc::new(self.dispatcher()),
            Duration::seconds(300),
        )
    }

    pub fn engine(&self) -> Engine {
        Engine::new(
            self.storage.clone(),
            self.channels(),
            self.clock(),
            EngineSettings::default(),
        )
    }

    /// Owner and message rows for `message_id`.
    pub async fn seed_directory(&self, message_id: &str) {
        self.storage.upsert_owner(&owner()).await.unwrap();
        self.storage.upsert_message(&message(message_id)).await.unwrap();
    }

    /// Store `condition` as the active condition of its message, without
    /// generating a schedule.
    pub async fn seed(&self, mut condition: TriggerCondition) -> TriggerCondition {
        self.seed_directory(&condition.message_id).await;
        condition.active = false;
        self.storage.insert_condition(&condition).await.unwrap();
        self.storage
            .activate_condition(&condition.id, t0())
            .await
            .unwrap();
        condition.active = true;
        condition
    }
}
