// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery dispatcher.
//!
//! Takes one claimed (`processing`) entry to a terminal state or back to
//! `pending`. Every send attempt is written to the delivery log, whatever
//! its outcome. Errors never escape [`Dispatcher::deliver`]: they become a
//! status transition plus a log row, so one bad entry cannot abort a cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use lastword_core::{
    ChannelKind, Clock, ConditionKind, DeliveryLogRecord, DeliveryStatus, EmailChannel, EntryKind,
    EntryStatus, LastwordError, MessagingChannel, OutboundEmail, OutboundText, ScheduleEntry,
    SentRecord, StorageAdapter, TriggerCondition,
};

use crate::content::{RenderContext, Rendered, render};
use crate::deadline::deadline;
use crate::generator::ScheduleGenerator;
use crate::routing::{Target, resolve_targets};

/// The outbound channels available to the dispatcher. Either may be absent.
#[derive(Clone, Default)]
pub struct Channels {
    pub email: Option<Arc<dyn EmailChannel + Send + Sync>>,
    pub messaging: Option<Arc<dyn MessagingChannel + Send + Sync>>,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_retries: u32,
    pub channel_timeout: Duration,
    pub idempotency_window: chrono::Duration,
    pub service_name: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            channel_timeout: Duration::from_secs(30),
            idempotency_window: chrono::Duration::minutes(60),
            service_name: "lastword".to_string(),
        }
    }
}

/// What happened to one claimed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// At least one (recipient, channel) pair succeeded.
    Sent { delivered: usize, skipped: usize, failed: usize },
    /// A final delivery already recorded in the sent ledger.
    AlreadySent,
    /// Claimed before it was due; back to `pending`.
    Released,
    Obsoleted { reason: String },
    /// `status` is `pending` while retries remain, `failed` otherwise.
    Failed { status: EntryStatus, error: String },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. } | DispatchOutcome::AlreadySent)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchOutcome::Failed { .. })
    }
}

enum PlannedSend {
    Email(String),
    Text(String),
}

impl PlannedSend {
    fn address(&self) -> &str {
        match self {
            PlannedSend::Email(a) | PlannedSend::Text(a) => a,
        }
    }

    fn channel(&self) -> ChannelKind {
        match self {
            PlannedSend::Email(_) => ChannelKind::Email,
            PlannedSend::Text(_) => ChannelKind::Messaging,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairResult {
    Delivered,
    Skipped,
    Failed,
}

pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    channels: Channels,
    clock: Arc<dyn Clock>,
    generator: ScheduleGenerator,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        channels: Channels,
        clock: Arc<dyn Clock>,
        generator: ScheduleGenerator,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            storage,
            channels,
            clock,
            generator,
            settings,
        }
    }

    /// Deliver one claimed entry. `force` skips the due-time check.
    pub async fn deliver(&self, entry: ScheduleEntry, force: bool) -> DispatchOutcome {
        let now = self.clock.now();
        match self.attempt(&entry, force, now).await {
            Ok(outcome) => outcome,
            Err(err) => self.fail(&entry, err, now).await,
        }
    }

    async fn attempt(
        &self,
        entry: &ScheduleEntry,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, LastwordError> {
        // 1. Re-validate due-ness; the claim may have raced a regeneration.
        if !force && !entry.is_due(now) {
            self.storage.release_entry(entry.id, now).await?;
            debug!(entry_id = entry.id, "entry not yet due, released");
            return Ok(DispatchOutcome::Released);
        }

        // 2. Load the condition and check it still wants this entry.
        let condition = self
            .storage
            .get_condition(&entry.condition_id)
            .await?
            .ok_or_else(|| LastwordError::NotFound {
                entity: "condition",
                id: entry.condition_id.clone(),
            })?;
        let deadline = deadline(&condition);

        if let Some(reason) = self.obsolete_reason(entry, &condition, deadline, now) {
            self.storage.mark_entry_obsolete(entry.id, now).await?;
            info!(entry_id = entry.id, kind = %entry.kind, reason, "entry obsoleted");
            return Ok(DispatchOutcome::Obsoleted {
                reason: reason.to_string(),
            });
        }

        if entry.kind == EntryKind::FinalDelivery
            && self
                .storage
                .has_sent_record(&entry.message_id, &entry.condition_id, entry.scheduled_at)
                .await?
        {
            self.storage.mark_entry_sent(entry.id, now).await?;
            info!(entry_id = entry.id, "final delivery already in sent ledger");
            return Ok(DispatchOutcome::AlreadySent);
        }

        // 3. Resolve content and targets.
        let message = self
            .storage
            .get_message(&entry.message_id)
            .await?
            .ok_or_else(|| LastwordError::NotFound {
                entity: "message",
                id: entry.message_id.clone(),
            })?;
        let owner = self
            .storage
            .get_owner(&condition.user_id)
            .await?
            .ok_or_else(|| LastwordError::NotFound {
                entity: "owner",
                id: condition.user_id.clone(),
            })?;

        let targets = resolve_targets(entry, &condition, &owner);
        if targets.is_empty() {
            return Err(LastwordError::NoRecipients {
                condition_id: condition.id.clone(),
            });
        }
        let rendered = render(&RenderContext {
            kind: entry.kind,
            message: &message,
            condition: &condition,
            owner: &owner,
            deadline,
            service_name: &self.settings.service_name,
        });

        // 4. Fan out to every (target, channel) pair.
        let sends = plan_sends(&targets);
        let results = join_all(
            sends
                .iter()
                .map(|send| self.send_one(entry, send, &rendered, now)),
        )
        .await;

        let delivered = results.iter().filter(|r| **r == PairResult::Delivered).count();
        let skipped = results.iter().filter(|r| **r == PairResult::Skipped).count();
        let failed = results.len() - delivered - skipped;

        if delivered + skipped == 0 {
            return Err(LastwordError::channel(format!(
                "all {} delivery attempts failed",
                results.len()
            )));
        }

        // 5. Commit.
        self.storage.mark_entry_sent(entry.id, now).await?;
        info!(
            entry_id = entry.id,
            kind = %entry.kind,
            delivered,
            skipped,
            failed,
            "entry sent"
        );
        if entry.kind == EntryKind::FinalDelivery {
            self.complete_final_delivery(entry, &condition, now).await;
        }
        Ok(DispatchOutcome::Sent {
            delivered,
            skipped,
            failed,
        })
    }

    fn obsolete_reason(
        &self,
        entry: &ScheduleEntry,
        condition: &TriggerCondition,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<&'static str> {
        if !condition.active {
            return Some("condition inactive");
        }
        match entry.kind {
            EntryKind::Reminder | EntryKind::FinalNotice => {
                if deadline.is_some_and(|d| entry.scheduled_at >= d) {
                    Some("deadline moved")
                } else if self
                    .generator
                    .staleness()
                    .is_stale(entry.scheduled_at, deadline, now)
                {
                    Some("stale")
                } else {
                    None
                }
            }
            // A check-in after this entry was drafted pushed the deadline out.
            EntryKind::FinalDelivery => deadline
                .is_some_and(|d| entry.scheduled_at < d)
                .then_some("deadline moved"),
        }
    }

    async fn send_one(
        &self,
        entry: &ScheduleEntry,
        send: &PlannedSend,
        rendered: &Rendered,
        now: DateTime<Utc>,
    ) -> PairResult {
        let address = send.address();
        let channel = send.channel();
        let since = now - self.settings.idempotency_window;

        match self
            .storage
            .recent_successful_attempt(entry.id, address, channel, since)
            .await
        {
            Ok(true) => {
                debug!(entry_id = entry.id, %channel, "already sent within window, skipping");
                self.log_attempt(entry, address, channel, DeliveryStatus::Skipped, None, None, now)
                    .await;
                return PairResult::Skipped;
            }
            Ok(false) => {}
            Err(e) => warn!(entry_id = entry.id, error = %e, "idempotency check failed"),
        }

        let result = match send {
            PlannedSend::Email(to) => match &self.channels.email {
                Some(email) => {
                    let out = OutboundEmail {
                        to: to.clone(),
                        subject: rendered.subject.clone(),
                        html: rendered.html.clone(),
                    };
                    self.bounded(email.send(out)).await
                }
                None => Err(LastwordError::channel("email channel not configured")),
            },
            PlannedSend::Text(to) => match &self.channels.messaging {
                Some(messaging) => {
                    let out = OutboundText {
                        to: to.clone(),
                        text: rendered.text.clone(),
                    };
                    self.bounded(messaging.send(out)).await
                }
                None => Err(LastwordError::channel("messaging channel not configured")),
            },
        };

        match result {
            Ok(receipt) => {
                let response = serde_json::to_value(&receipt).ok();
                self.log_attempt(entry, address, channel, DeliveryStatus::Sent, None, response, now)
                    .await;
                PairResult::Delivered
            }
            Err(e) => {
                warn!(entry_id = entry.id, %channel, error = %e, "delivery attempt failed");
                self.log_attempt(
                    entry,
                    address,
                    channel,
                    DeliveryStatus::Failed,
                    Some(e.to_string()),
                    None,
                    now,
                )
                .await;
                PairResult::Failed
            }
        }
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T, LastwordError>
    where
        F: std::future::Future<Output = Result<T, LastwordError>>,
    {
        let limit = self.settings.channel_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| LastwordError::Timeout { duration: limit })?
    }

    #[allow(clippy::too_many_arguments)]
    async fn log_attempt(
        &self,
        entry: &ScheduleEntry,
        recipient: &str,
        channel: ChannelKind,
        status: DeliveryStatus,
        error: Option<String>,
        response: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) {
        let record = DeliveryLogRecord {
            id: None,
            entry_id: entry.id,
            message_id: entry.message_id.clone(),
            condition_id: entry.condition_id.clone(),
            recipient: recipient.to_string(),
            channel,
            status,
            error,
            response,
            created_at: now,
        };
        if let Err(e) = self.storage.append_delivery_log(&record).await {
            error!(entry_id = entry.id, error = %e, "failed to write delivery log");
        }
    }

    /// Record the delivery and decide whether the condition stays armed.
    ///
    /// The entry is already `sent`; failures here are logged only.
    async fn complete_final_delivery(
        &self,
        entry: &ScheduleEntry,
        condition: &TriggerCondition,
        now: DateTime<Utc>,
    ) {
        let record = SentRecord {
            message_id: entry.message_id.clone(),
            condition_id: entry.condition_id.clone(),
            user_id: condition.user_id.clone(),
            deadline: entry.scheduled_at,
            sent_at: now,
        };
        if let Err(e) = self.storage.append_sent_record(&record).await {
            error!(entry_id = entry.id, error = %e, "failed to append sent record");
        }

        let result = match &condition.kind {
            ConditionKind::ScheduledDate {
                trigger_at,
                recurring: Some(pattern),
            } => match pattern.next_after(*trigger_at, now) {
                Some(next) => self.rearm_recurring(condition, next, now).await,
                None => self.retire(condition, now).await,
            },
            _ if condition.keep_armed() => {
                info!(condition_id = %condition.id, "condition kept armed after delivery");
                Ok(())
            }
            _ => self.retire(condition, now).await,
        };
        if let Err(e) = result {
            error!(condition_id = %condition.id, error = %e, "post-delivery update failed");
        }
    }

    async fn rearm_recurring(
        &self,
        condition: &TriggerCondition,
        next: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError> {
        let mut updated = condition.clone();
        if let ConditionKind::ScheduledDate { trigger_at, .. } = &mut updated.kind {
            *trigger_at = next;
        }
        updated.updated_at = now;
        self.storage.update_condition(&updated).await?;
        self.generator
            .regenerate(self.storage.as_ref(), &updated, now)
            .await?;
        info!(condition_id = %condition.id, next = %next, "recurring condition re-armed");
        Ok(())
    }

    async fn retire(
        &self,
        condition: &TriggerCondition,
        now: DateTime<Utc>,
    ) -> Result<(), LastwordError> {
        self.storage.deactivate_condition(&condition.id, now).await?;
        let obsoleted = self
            .storage
            .obsolete_pending_entries(&condition.message_id, Some(&condition.id), now)
            .await?;
        info!(condition_id = %condition.id, obsoleted, "condition deactivated after delivery");
        Ok(())
    }

    /// Convert an error into a status transition.
    ///
    /// Per-attempt channel failures are already in the delivery log; other
    /// errors get one entry-level row tagged with the error kind.
    async fn fail(
        &self,
        entry: &ScheduleEntry,
        err: LastwordError,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        if !matches!(err, LastwordError::Channel { .. } | LastwordError::Timeout { .. }) {
            self.log_attempt(
                entry,
                "-",
                ChannelKind::None,
                DeliveryStatus::Failed,
                Some(format!("{}: {err}", err.tag())),
                None,
                now,
            )
            .await;
        }

        let transition = if err.is_transient() {
            self.storage
                .record_entry_failure(entry.id, self.settings.max_retries, now)
                .await
        } else {
            self.storage
                .mark_entry_failed(entry.id, now)
                .await
                .map(|()| EntryStatus::Failed)
        };

        let status = match transition {
            Ok(status) => status,
            Err(e) => {
                // Left in `processing`; the reclaimer picks it up.
                error!(entry_id = entry.id, error = %e, "failed to record entry failure");
                EntryStatus::Processing
            }
        };
        warn!(
            entry_id = entry.id,
            kind = %entry.kind,
            %status,
            error = %err,
            "entry delivery failed"
        );
        DispatchOutcome::Failed {
            status,
            error: err.tag().to_string(),
        }
    }
}

fn plan_sends(targets: &[Target]) -> Vec<PlannedSend> {
    let mut sends = Vec::new();
    for target in targets {
        if let Some(email) = target.email.as_deref().filter(|e| !e.trim().is_empty()) {
            sends.push(PlannedSend::Email(email.trim().to_string()));
        }
        if let Some(phone) = target.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            sends.push(PlannedSend::Text(phone.trim().to_string()));
        }
    }
    sends
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, check_in_condition, t0};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use lastword_core::{ClaimRequest, EntryDraft, Recipient, RecurringEvery, RecurringPattern};

    async fn claim_one(fx: &Fixture, force: bool) -> ScheduleEntry {
        let mut claimed = fx
            .storage
            .claim_due_entries(&ClaimRequest::due(1, fx.clock.now()).forced(force))
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1, "expected one claimable entry");
        claimed.remove(0)
    }

    async fn seed_final(fx: &Fixture, condition: &TriggerCondition, at: DateTime<Utc>) {
        fx.storage
            .insert_entries_if_absent(
                &[EntryDraft::new(
                    &condition.message_id,
                    &condition.id,
                    at,
                    EntryKind::FinalDelivery,
                )],
                at,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn final_delivery_reaches_recipients_and_retires_condition() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.clock.set(deadline);

        let entry = claim_one(&fx, false).await;
        let outcome = fx.dispatcher().deliver(entry.clone(), false).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                delivered: 1,
                skipped: 0,
                failed: 0
            }
        );
        let sent = fx.email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "rae@example.com");
        assert!(
            fx.storage
                .has_sent_record("m1", "c1", deadline)
                .await
                .unwrap()
        );
        let stored = fx.storage.get_condition("c1").await.unwrap().unwrap();
        assert!(!stored.active);
        let entry = fx.storage.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Sent);
    }

    #[tokio::test]
    async fn not_yet_due_entries_are_released() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        seed_final(&fx, &condition, t0() + ChronoDuration::hours(24)).await;

        let entry = claim_one(&fx, true).await;
        let outcome = fx.dispatcher().deliver(entry.clone(), false).await;

        assert_eq!(outcome, DispatchOutcome::Released);
        let entry = fx.storage.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert!(fx.email.sent().is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn inactive_condition_obsoletes_reminder() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        let at = t0() + ChronoDuration::hours(23);
        fx.storage
            .insert_entries_if_absent(
                &[EntryDraft::new("m1", "c1", at, EntryKind::Reminder)],
                t0(),
            )
            .await
            .unwrap();
        fx.storage.deactivate_condition(&condition.id, t0()).await.unwrap();
        fx.clock.set(at);

        let entry = claim_one(&fx, false).await;
        let outcome = fx.dispatcher().deliver(entry, false).await;
        assert!(matches!(outcome, DispatchOutcome::Obsoleted { .. }));
        assert!(fx.email.sent().is_empty());
        assert!(logs_contain("entry obsoleted"));
    }

    #[tokio::test]
    async fn ledger_hit_marks_sent_without_resending() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.storage
            .append_sent_record(&SentRecord {
                message_id: "m1".into(),
                condition_id: "c1".into(),
                user_id: "owner-1".into(),
                deadline,
                sent_at: deadline,
            })
            .await
            .unwrap();
        fx.clock.set(deadline);

        let entry = claim_one(&fx, false).await;
        assert_eq!(
            fx.dispatcher().deliver(entry, false).await,
            DispatchOutcome::AlreadySent
        );
        assert!(fx.email.sent().is_empty());
    }

    #[tokio::test]
    async fn channel_failure_counts_against_retry_budget() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.clock.set(deadline);
        fx.email.fail_with("smtp 451");

        let entry = claim_one(&fx, false).await;
        let outcome = fx.dispatcher().deliver(entry.clone(), false).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                status: EntryStatus::Pending,
                error: "channel".into()
            }
        );
        let stored = fx.storage.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 1);
        let log = fx.storage.delivery_log_for_entry(entry.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, DeliveryStatus::Failed);
        assert_eq!(log[0].channel, ChannelKind::Email);
    }

    #[tokio::test]
    async fn missing_recipients_fail_immediately_with_tag() {
        let fx = Fixture::new().await;
        let mut condition = check_in_condition("c1", "m1");
        condition.recipients.clear();
        let condition = fx.seed(condition).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.clock.set(deadline);

        let entry = claim_one(&fx, false).await;
        let outcome = fx.dispatcher().deliver(entry.clone(), false).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                status: EntryStatus::Failed,
                error: "no_recipients".into()
            }
        );
        let log = fx.storage.delivery_log_for_entry(entry.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].channel, ChannelKind::None);
        assert!(log[0].error.as_deref().unwrap().starts_with("no_recipients"));
    }

    #[tokio::test]
    async fn partial_channel_failure_still_sends() {
        let fx = Fixture::new().await;
        let mut condition = check_in_condition("c1", "m1");
        condition.recipients.push(Recipient {
            id: "r2".into(),
            name: "Sam".into(),
            email: None,
            phone: Some("+15550002222".into()),
        });
        let condition = fx.seed(condition).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.clock.set(deadline);
        fx.email.fail_with("mailbox full");

        let entry = claim_one(&fx, false).await;
        let outcome = fx.dispatcher().deliver(entry, false).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                delivered: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(fx.messaging.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_channel_times_out() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.clock.set(deadline);
        fx.email.hang();

        let entry = claim_one(&fx, false).await;
        let outcome = fx.dispatcher().deliver(entry.clone(), false).await;
        assert!(outcome.is_failure());
        let log = fx.storage.delivery_log_for_entry(entry.id).await.unwrap();
        assert!(log[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn recent_success_is_skipped_not_resent() {
        let fx = Fixture::new().await;
        let condition = fx.seed(check_in_condition("c1", "m1")).await;
        let deadline = t0() + ChronoDuration::hours(24);
        seed_final(&fx, &condition, deadline).await;
        fx.clock.set(deadline);

        let entry = claim_one(&fx, false).await;
        fx.storage
            .append_delivery_log(&DeliveryLogRecord {
                id: None,
                entry_id: entry.id,
                message_id: "m1".into(),
                condition_id: "c1".into(),
                recipient: "rae@example.com".into(),
                channel: ChannelKind::Email,
                status: DeliveryStatus::Sent,
                error: None,
                response: None,
                created_at: deadline - ChronoDuration::minutes(5),
            })
            .await
            .unwrap();

        let outcome = fx.dispatcher().deliver(entry, false).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                delivered: 0,
                skipped: 1,
                failed: 0
            }
        );
        assert!(fx.email.sent().is_empty());
    }

    fn recurring_condition(trigger_at: DateTime<Utc>, every: RecurringEvery) -> TriggerCondition {
        let mut condition = check_in_condition("c1", "m1");
        condition.kind = ConditionKind::ScheduledDate {
            trigger_at,
            recurring: Some(RecurringPattern { every, interval: 1 }),
        };
        condition
    }

    fn pending_finals(entries: &[ScheduleEntry]) -> Vec<DateTime<Utc>> {
        entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending && e.kind == EntryKind::FinalDelivery)
            .map(|e| e.scheduled_at)
            .collect()
    }

    #[tokio::test]
    async fn recurring_delivery_rearms_for_next_occurrence() {
        let fx = Fixture::new().await;
        let trigger_at = t0() + ChronoDuration::hours(2);
        let condition = fx
            .seed(recurring_condition(trigger_at, RecurringEvery::Daily))
            .await;
        seed_final(&fx, &condition, trigger_at).await;
        fx.clock.set(trigger_at);

        let entry = claim_one(&fx, false).await;
        assert!(fx.dispatcher().deliver(entry, false).await.is_success());

        let stored = fx.storage.get_condition("c1").await.unwrap().unwrap();
        assert!(stored.active);
        let next = trigger_at + ChronoDuration::days(1);
        assert_eq!(deadline(&stored), Some(next));
        assert_eq!(fx.email.sent().len(), 1);
        assert!(
            fx.storage
                .has_sent_record("m1", "c1", trigger_at)
                .await
                .unwrap()
        );
        let entries = fx.storage.list_entries("m1").await.unwrap();
        assert_eq!(pending_finals(&entries), vec![next]);
    }

    #[tokio::test]
    async fn monthly_recurrence_clamps_to_month_end() {
        let fx = Fixture::new().await;
        let jan_31 = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();
        let mut condition = recurring_condition(jan_31, RecurringEvery::Monthly);
        condition.reminder_minutes.clear();
        let condition = fx.seed(condition).await;
        seed_final(&fx, &condition, jan_31).await;
        fx.clock.set(jan_31);

        let entry = claim_one(&fx, false).await;
        assert!(fx.dispatcher().deliver(entry, false).await.is_success());

        let stored = fx.storage.get_condition("c1").await.unwrap().unwrap();
        let feb_28 = Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap();
        assert!(stored.active);
        assert_eq!(deadline(&stored), Some(feb_28));
        let entries = fx.storage.list_entries("m1").await.unwrap();
        assert_eq!(pending_finals(&entries), vec![feb_28]);
    }
}
