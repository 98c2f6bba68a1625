// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder schedule generation.
//!
//! A condition's schedule is a pure function of its configuration and `now`:
//! one reminder per lead time, an optional final notice for check-in kinds,
//! and exactly one final delivery at the deadline. Persisting replaces the
//! pending set in a single write transaction, so regenerating twice is a
//! no-op the second time.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use lastword_core::{
    EntryDraft, EntryKind, LastwordError, RegenerateOutcome, StorageAdapter, TriggerCondition,
};

use crate::deadline::{StalenessPolicy, deadline};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleGenerator {
    staleness: StalenessPolicy,
    final_notice: Option<Duration>,
}

impl ScheduleGenerator {
    pub fn new(staleness: StalenessPolicy, final_notice: Option<Duration>) -> Self {
        Self {
            staleness,
            final_notice,
        }
    }

    pub fn staleness(&self) -> StalenessPolicy {
        self.staleness
    }

    /// Build the drafts for a condition, ordered by scheduled time.
    ///
    /// Inactive conditions and conditions without a deadline yield nothing.
    pub fn drafts(&self, condition: &TriggerCondition, now: DateTime<Utc>) -> Vec<EntryDraft> {
        if !condition.active {
            return Vec::new();
        }
        let Some(deadline) = deadline(condition) else {
            return Vec::new();
        };

        let mut drafts = Vec::new();
        let mut leads: Vec<u32> = condition.reminder_minutes.clone();
        leads.sort_unstable();
        leads.dedup();

        for minutes in leads {
            let scheduled_at = deadline - Duration::minutes(i64::from(minutes));
            if self.staleness.is_stale(scheduled_at, Some(deadline), now) {
                debug!(
                    condition_id = %condition.id,
                    minutes,
                    "skipping stale reminder"
                );
                continue;
            }
            drafts.push(EntryDraft::new(
                &condition.message_id,
                &condition.id,
                scheduled_at,
                EntryKind::Reminder,
            ));
        }

        if let Some(lead) = self.final_notice.filter(|_| condition.kind.is_check_in()) {
            let scheduled_at = deadline - lead;
            if !self.staleness.is_stale(scheduled_at, Some(deadline), now) {
                drafts.push(EntryDraft::new(
                    &condition.message_id,
                    &condition.id,
                    scheduled_at,
                    EntryKind::FinalNotice,
                ));
            }
        }

        drafts.push(EntryDraft::new(
            &condition.message_id,
            &condition.id,
            deadline,
            EntryKind::FinalDelivery,
        ));

        drafts.sort_by_key(|d| (d.scheduled_at, kind_rank(d.kind)));
        drafts
    }

    /// Replace the pending schedule of `condition` with freshly generated drafts.
    ///
    /// An inactive condition only has its pending entries obsoleted.
    pub async fn regenerate(
        &self,
        storage: &dyn StorageAdapter,
        condition: &TriggerCondition,
        now: DateTime<Utc>,
    ) -> Result<RegenerateOutcome, LastwordError> {
        if !condition.active {
            let obsoleted = storage
                .obsolete_pending_entries(&condition.message_id, Some(&condition.id), now)
                .await?;
            return Ok(RegenerateOutcome {
                obsoleted,
                inserted: 0,
            });
        }

        let drafts = self.drafts(condition, now);
        let outcome = storage
            .replace_pending_entries(&condition.message_id, &condition.id, &drafts, now)
            .await?;
        debug!(
            condition_id = %condition.id,
            message_id = %condition.message_id,
            drafted = drafts.len(),
            obsoleted = outcome.obsoleted,
            inserted = outcome.inserted,
            "schedule regenerated"
        );
        Ok(outcome)
    }
}

/// A final delivery due immediately, used by the panic flow.
pub fn immediate_final_delivery(condition: &TriggerCondition, now: DateTime<Utc>) -> EntryDraft {
    EntryDraft::new(
        &condition.message_id,
        &condition.id,
        now,
        EntryKind::FinalDelivery,
    )
}

fn kind_rank(kind: EntryKind) -> u8 {
    match kind {
        EntryKind::Reminder => 0,
        EntryKind::FinalNotice => 1,
        EntryKind::FinalDelivery => 2,
    }
}
