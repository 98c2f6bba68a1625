// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine: one handle over every scheduling operation.
//!
//! The engine owns no timers. A processing cycle runs when [`Engine::process`]
//! is called; the host decides how often. Overlapping cycles are safe
//! because claiming is atomic and inserts are deduplicated by the store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lastword_config::model::LastwordConfig;
use lastword_core::{
    ClaimRequest, Clock, EntryKind, EntryStats, LastwordError, PanicSignal, RegenerateOutcome,
    StorageAdapter, TriggerCondition,
};

use crate::deadline::StalenessPolicy;
use crate::dispatcher::{Channels, DispatchOutcome, DispatchSettings, Dispatcher};
use crate::generator::ScheduleGenerator;
use crate::lifecycle::Lifecycle;
use crate::panic::{PanicFlow, PanicOutcome};
use crate::reclaimer::{ReclaimReport, Reclaimer};

/// Tunables for the engine, usually derived from [`LastwordConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub batch_limit: usize,
    pub max_concurrent_dispatch: usize,
    pub stuck_after: Duration,
    pub recent_window: Duration,
    pub selection_ttl: Duration,
    pub staleness: StalenessPolicy,
    pub final_notice: Option<Duration>,
    pub dispatch: DispatchSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&LastwordConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &LastwordConfig) -> Self {
        let scheduler = &config.scheduler;
        Self {
            batch_limit: scheduler.batch_limit,
            max_concurrent_dispatch: scheduler.max_concurrent_dispatch.max(1),
            stuck_after: Duration::seconds(secs(scheduler.stuck_after_secs)),
            recent_window: Duration::hours(i64::from(scheduler.recent_window_hours)),
            selection_ttl: Duration::seconds(secs(config.panic.selection_ttl_secs)),
            staleness: StalenessPolicy::from_minutes(scheduler.stale_reminder_minutes),
            final_notice: scheduler
                .final_notice_minutes
                .map(|m| Duration::minutes(i64::from(m))),
            dispatch: DispatchSettings {
                max_retries: scheduler.max_retries,
                channel_timeout: std::time::Duration::from_secs(scheduler.channel_timeout_secs),
                idempotency_window: Duration::minutes(i64::from(
                    scheduler.idempotency_window_minutes,
                )),
                service_name: config.service.name.clone(),
            },
        }
    }
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX / 1_000)
}

/// Parameters of one processing cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Only claim entries of this message.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Claim pending entries regardless of their scheduled time.
    #[serde(default)]
    pub force_send: bool,
    /// Include per-entry outcomes in the summary.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub entry_id: i64,
    pub message_id: String,
    pub kind: EntryKind,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reclaimed: ReclaimReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<EntryReport>>,
}

pub struct Engine {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    dispatcher: Arc<Dispatcher>,
    reclaimer: Reclaimer,
    lifecycle: Lifecycle,
    panic: PanicFlow,
}

impl Engine {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        channels: Channels,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        let generator = ScheduleGenerator::new(settings.staleness, settings.final_notice);
        let dispatcher = Arc::new(Dispatcher::new(
            storage.clone(),
            channels,
            clock.clone(),
            generator,
            settings.dispatch.clone(),
        ));
        let reclaimer = Reclaimer::new(storage.clone(), settings.stuck_after);
        let lifecycle = Lifecycle::new(storage.clone(), clock.clone(), generator);
        let panic = PanicFlow::new(
            storage.clone(),
            clock.clone(),
            dispatcher.clone(),
            settings.selection_ttl,
        );
        Self {
            storage,
            clock,
            settings,
            dispatcher,
            reclaimer,
            lifecycle,
            panic,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter + Send + Sync> {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run one processing cycle: reclaim, claim, dispatch.
    ///
    /// A failing reclaim sweep is logged and the cycle continues; a failing
    /// claim fails the call, since nothing was taken.
    pub async fn process(&self, request: ProcessRequest) -> Result<ProcessSummary, LastwordError> {
        let now = self.clock.now();

        // 1. Recover abandoned work first so it is claimable this cycle.
        let reclaimed = match self.reclaimer.sweep(now).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "reclaim sweep failed");
                ReclaimReport::default()
            }
        };

        // 2. Claim.
        let claim = ClaimRequest {
            limit: self.settings.batch_limit,
            message_id: request.message_id.clone(),
            force_send: request.force_send,
            draft: None,
            now,
        };
        let entries = self.storage.claim_due_entries(&claim).await?;
        if entries.is_empty() {
            return Ok(ProcessSummary {
                reclaimed,
                details: request.debug.then(Vec::new),
                ..ProcessSummary::default()
            });
        }

        // 3. Dispatch with bounded concurrency.
        let force = request.force_send;
        let reports: Vec<EntryReport> = futures::stream::iter(entries)
            .map(|entry| {
                let dispatcher = self.dispatcher.clone();
                async move {
                    let entry_id = entry.id;
                    let message_id = entry.message_id.clone();
                    let kind = entry.kind;
                    let outcome = dispatcher.deliver(entry, force).await;
                    EntryReport {
                        entry_id,
                        message_id,
                        kind,
                        outcome,
                    }
                }
            })
            .buffer_unordered(self.settings.max_concurrent_dispatch)
            .collect()
            .await;

        let summary = ProcessSummary {
            processed: reports.len(),
            succeeded: reports.iter().filter(|r| r.outcome.is_success()).count(),
            failed: reports.iter().filter(|r| r.outcome.is_failure()).count(),
            reclaimed,
            details: request.debug.then_some(reports),
        };
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "processing cycle complete"
        );
        Ok(summary)
    }

    pub async fn regenerate_schedule(
        &self,
        message_id: &str,
    ) -> Result<RegenerateOutcome, LastwordError> {
        self.lifecycle.regenerate_schedule(message_id).await
    }

    pub async fn fix_stuck(&self) -> Result<ReclaimReport, LastwordError> {
        self.reclaimer.sweep(self.clock.now()).await
    }

    pub async fn stats(&self) -> Result<EntryStats, LastwordError> {
        let now = self.clock.now();
        self.storage
            .entry_stats(now, now - self.settings.recent_window)
            .await
    }

    pub async fn create_condition(
        &self,
        condition: TriggerCondition,
    ) -> Result<TriggerCondition, LastwordError> {
        self.lifecycle.create_condition(condition).await
    }

    pub async fn update_condition(
        &self,
        condition: TriggerCondition,
    ) -> Result<TriggerCondition, LastwordError> {
        self.lifecycle.update_condition(condition).await
    }

    pub async fn arm(&self, condition_id: &str) -> Result<TriggerCondition, LastwordError> {
        self.lifecycle.arm(condition_id).await
    }

    pub async fn disarm(&self, message_id: &str) -> Result<bool, LastwordError> {
        self.lifecycle.disarm(message_id).await
    }

    pub async fn check_in(&self, message_id: &str) -> Result<DateTime<Utc>, LastwordError> {
        self.lifecycle.check_in(message_id).await
    }

    pub async fn check_in_user(&self, user_id: &str) -> Result<usize, LastwordError> {
        self.lifecycle.check_in_user(user_id).await
    }

    pub async fn trigger_panic(&self, signal: PanicSignal) -> Result<PanicOutcome, LastwordError> {
        self.panic.trigger(signal).await
    }

    pub async fn reply_panic(
        &self,
        user_id: &str,
        text: &str,
    ) -> Result<PanicOutcome, LastwordError> {
        self.panic.reply(user_id, text).await
    }

    /// Drop expired panic selections. Called from the host's tick.
    pub fn purge_expired_selections(&self) -> usize {
        self.panic.selections().purge_expired()
    }
}
