// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Condition lifecycle: create, edit, arm, disarm and check in.
//!
//! Every mutation regenerates the affected schedule synchronously. A failed
//! regeneration is logged and does not fail the mutation; the next edit or
//! check-in regenerates again, and the dispatcher drops entries that no
//! longer match the condition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use lastword_core::{Clock, LastwordError, RegenerateOutcome, StorageAdapter, TriggerCondition};

use crate::deadline::deadline;
use crate::generator::ScheduleGenerator;

pub struct Lifecycle {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    clock: Arc<dyn Clock>,
    generator: ScheduleGenerator,
}

impl Lifecycle {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        clock: Arc<dyn Clock>,
        generator: ScheduleGenerator,
    ) -> Self {
        Self {
            storage,
            clock,
            generator,
        }
    }

    /// Store a new condition. If it arrives active it is armed.
    pub async fn create_condition(
        &self,
        mut condition: TriggerCondition,
    ) -> Result<TriggerCondition, LastwordError> {
        validate(&condition)?;
        let arm = condition.active;
        condition.active = false;
        self.storage.insert_condition(&condition).await?;
        info!(condition_id = %condition.id, kind = %condition.condition_type(), "condition created");
        if arm {
            return self.arm(&condition.id).await;
        }
        Ok(condition)
    }

    /// Overwrite a condition's configuration and regenerate its schedule.
    ///
    /// The active flag is owned by `arm`/`disarm` and is not changed here.
    pub async fn update_condition(
        &self,
        mut condition: TriggerCondition,
    ) -> Result<TriggerCondition, LastwordError> {
        validate(&condition)?;
        let now = self.clock.now();
        let stored = self.require(&condition.id).await?;
        condition.active = stored.active;
        condition.created_at = stored.created_at;
        condition.updated_at = now;
        self.storage.update_condition(&condition).await?;
        self.regenerate_quietly(&condition, now).await;
        Ok(condition)
    }

    /// Make a condition the active one for its message.
    ///
    /// Check-in conditions start counting from now unless already armed.
    pub async fn arm(&self, condition_id: &str) -> Result<TriggerCondition, LastwordError> {
        let now = self.clock.now();
        let mut condition = self.require(condition_id).await?;

        // Siblings lose their active flag; their pending entries go too.
        if let Some(previous) = self
            .storage
            .active_condition_for_message(&condition.message_id)
            .await?
            .filter(|c| c.id != condition.id)
        {
            self.storage
                .obsolete_pending_entries(&previous.message_id, Some(&previous.id), now)
                .await?;
        }

        // Arming an inactive condition starts a fresh window.
        let was_active = condition.active;
        if let Some(window) = condition.kind.check_in_window_mut() {
            if was_active {
                window.last_checked_at.get_or_insert(now);
            } else {
                window.last_checked_at = Some(now);
            }
        }
        condition.updated_at = now;
        // The active flag is flipped together with the siblings' below.
        self.storage
            .update_condition(&TriggerCondition {
                active: false,
                ..condition.clone()
            })
            .await?;
        self.storage.activate_condition(&condition.id, now).await?;
        condition.active = true;
        info!(condition_id = %condition.id, message_id = %condition.message_id, "condition armed");

        self.regenerate_quietly(&condition, now).await;
        Ok(condition)
    }

    /// Deactivate the message's active condition and drop its pending entries.
    ///
    /// Returns `false` when the message had nothing armed.
    pub async fn disarm(&self, message_id: &str) -> Result<bool, LastwordError> {
        let now = self.clock.now();
        let Some(condition) = self.storage.active_condition_for_message(message_id).await? else {
            return Ok(false);
        };
        self.storage.deactivate_condition(&condition.id, now).await?;
        let obsoleted = self
            .storage
            .obsolete_pending_entries(message_id, Some(&condition.id), now)
            .await?;
        info!(condition_id = %condition.id, %message_id, obsoleted, "condition disarmed");
        Ok(true)
    }

    /// Reset the check-in clock of a message's active condition.
    ///
    /// Returns the new deadline.
    pub async fn check_in(&self, message_id: &str) -> Result<DateTime<Utc>, LastwordError> {
        let condition = self
            .storage
            .active_condition_for_message(message_id)
            .await?
            .ok_or_else(|| LastwordError::NotFound {
                entity: "active condition",
                id: message_id.to_string(),
            })?;
        if !condition.kind.is_check_in() {
            return Err(LastwordError::InvalidInput(format!(
                "condition {} is {}, which does not accept check-ins",
                condition.id,
                condition.condition_type()
            )));
        }
        self.reset_check_in(condition, self.clock.now()).await
    }

    /// Reset every active check-in condition of a user. Returns how many.
    pub async fn check_in_user(&self, user_id: &str) -> Result<usize, LastwordError> {
        let now = self.clock.now();
        let conditions = self.storage.active_check_in_conditions(Some(user_id)).await?;
        let count = conditions.len();
        for condition in conditions {
            self.reset_check_in(condition, now).await?;
        }
        info!(%user_id, count, "user checked in");
        Ok(count)
    }

    /// Regenerate the schedule of a message's active condition.
    pub async fn regenerate_schedule(
        &self,
        message_id: &str,
    ) -> Result<RegenerateOutcome, LastwordError> {
        let condition = self
            .storage
            .active_condition_for_message(message_id)
            .await?
            .ok_or_else(|| LastwordError::NotFound {
                entity: "active condition",
                id: message_id.to_string(),
            })?;
        self.generator
            .regenerate(self.storage.as_ref(), &condition, self.clock.now())
            .await
    }

    async fn reset_check_in(
        &self,
        mut condition: TriggerCondition,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, LastwordError> {
        if let Some(window) = condition.kind.check_in_window_mut() {
            window.last_checked_at = Some(now);
        }
        condition.updated_at = now;
        self.storage.update_condition(&condition).await?;
        self.regenerate_quietly(&condition, now).await;

        let next = deadline(&condition).ok_or_else(|| {
            LastwordError::Internal(format!(
                "condition {} has no deadline after check-in",
                condition.id
            ))
        })?;
        info!(condition_id = %condition.id, deadline = %next, "checked in");
        Ok(next)
    }

    async fn regenerate_quietly(&self, condition: &TriggerCondition, now: DateTime<Utc>) {
        if let Err(e) = self
            .generator
            .regenerate(self.storage.as_ref(), condition, now)
            .await
        {
            warn!(condition_id = %condition.id, error = %e, "schedule regeneration failed");
        }
    }

    async fn require(&self, condition_id: &str) -> Result<TriggerCondition, LastwordError> {
        self.storage
            .get_condition(condition_id)
            .await?
            .ok_or_else(|| LastwordError::NotFound {
                entity: "condition",
                id: condition_id.to_string(),
            })
    }
}

fn validate(condition: &TriggerCondition) -> Result<(), LastwordError> {
    if condition
        .kind
        .check_in_window()
        .is_some_and(|w| w.threshold() <= chrono::Duration::zero())
    {
        return Err(LastwordError::InvalidInput(
            "check-in threshold must be greater than zero".to_string(),
        ));
    }
    if condition.reminder_minutes.contains(&0) {
        return Err(LastwordError::InvalidInput(
            "reminder lead times must be at least one minute".to_string(),
        ));
    }
    if condition.message_id.trim().is_empty() || condition.user_id.trim().is_empty() {
        return Err(LastwordError::InvalidInput(
            "condition needs a message and an owner".to_string(),
        ));
    }
    Ok(())
}
