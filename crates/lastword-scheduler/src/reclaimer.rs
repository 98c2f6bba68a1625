// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recovery sweep run at the start of every processing cycle.
//!
//! Two repairs:
//! - `processing` rows abandoned by a crashed or killed worker go back to
//!   `pending` so they can be claimed again.
//! - active check-in conditions whose deadline has passed without a final
//!   delivery entry (or a sent record) get one synthesized.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use lastword_core::{EntryDraft, EntryKind, LastwordError, StorageAdapter};

use crate::deadline::deadline;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub reset_count: usize,
    pub synthesized_count: usize,
}

pub struct Reclaimer {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    stuck_after: Duration,
}

impl Reclaimer {
    pub fn new(storage: Arc<dyn StorageAdapter + Send + Sync>, stuck_after: Duration) -> Self {
        Self {
            storage,
            stuck_after,
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<ReclaimReport, LastwordError> {
        let reset_count = self
            .storage
            .reset_stuck_entries(now - self.stuck_after, now)
            .await?;
        if reset_count > 0 {
            warn!(reset_count, "reset stuck processing entries");
        }

        let synthesized_count = self.synthesize_missed_deliveries(now).await?;
        Ok(ReclaimReport {
            reset_count,
            synthesized_count,
        })
    }

    async fn synthesize_missed_deliveries(&self, now: DateTime<Utc>) -> Result<usize, LastwordError> {
        let mut synthesized = 0;
        for condition in self.storage.active_check_in_conditions(None).await? {
            let Some(deadline) = deadline(&condition).filter(|d| *d <= now) else {
                continue;
            };
            if self
                .storage
                .has_sent_record(&condition.message_id, &condition.id, deadline)
                .await?
            {
                continue;
            }
            // Insert-or-ignore: an existing entry at this deadline wins.
            let draft = EntryDraft::new(
                &condition.message_id,
                &condition.id,
                deadline,
                EntryKind::FinalDelivery,
            );
            let inserted = self.storage.insert_entries_if_absent(&[draft], now).await?;
            if inserted > 0 {
                info!(
                    condition_id = %condition.id,
                    deadline = %deadline,
                    "synthesized missing final delivery"
                );
            }
            synthesized += inserted;
        }
        Ok(synthesized)
    }
}
