// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger condition persistence.
//!
//! The [`ConditionKind`] union is flattened into nullable per-kind columns on
//! write and rebuilt from `condition_type` on read.

use chrono::{DateTime, Utc};
use lastword_core::{
    CheckInWindow, ConditionKind, ConditionType, LastwordError, PanicConfig, TriggerCondition,
};
use rusqlite::{Row, params};

use crate::codec::{get_enum, get_json, get_opt_json, get_opt_ts, get_ts, opt_ts, to_json, ts};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, message_id, user_id, condition_type, active, last_checked_at,
    hours_threshold, minutes_threshold, trigger_at, recurring_pattern, reminder_minutes,
    recipients_json, panic_config_json, security_json, created_at, updated_at";

/// Column values for one condition row.
struct ConditionRow {
    id: String,
    message_id: String,
    user_id: String,
    condition_type: String,
    active: bool,
    last_checked_at: Option<String>,
    hours_threshold: Option<u32>,
    minutes_threshold: Option<u32>,
    trigger_at: Option<String>,
    recurring_pattern: Option<String>,
    reminder_minutes: String,
    recipients_json: String,
    panic_config_json: Option<String>,
    security_json: String,
    created_at: String,
    updated_at: String,
}

impl ConditionRow {
    fn encode(c: &TriggerCondition) -> Result<Self, LastwordError> {
        let json_err = |e: rusqlite::Error| LastwordError::storage(e);
        let mut row = ConditionRow {
            id: c.id.clone(),
            message_id: c.message_id.clone(),
            user_id: c.user_id.clone(),
            condition_type: c.condition_type().to_string(),
            active: c.active,
            last_checked_at: None,
            hours_threshold: None,
            minutes_threshold: None,
            trigger_at: None,
            recurring_pattern: None,
            reminder_minutes: to_json(&c.reminder_minutes).map_err(json_err)?,
            recipients_json: to_json(&c.recipients).map_err(json_err)?,
            panic_config_json: None,
            security_json: to_json(&c.security).map_err(json_err)?,
            created_at: ts(&c.created_at),
            updated_at: ts(&c.updated_at),
        };
        match &c.kind {
            ConditionKind::NoCheckIn(w)
            | ConditionKind::RecurringCheckIn(w)
            | ConditionKind::InactivityToDate(w) => {
                row.last_checked_at = opt_ts(&w.last_checked_at);
                row.hours_threshold = Some(w.hours);
                row.minutes_threshold = Some(w.minutes);
            }
            ConditionKind::ScheduledDate {
                trigger_at,
                recurring,
            } => {
                row.trigger_at = Some(ts(trigger_at));
                row.recurring_pattern = recurring
                    .as_ref()
                    .map(to_json)
                    .transpose()
                    .map_err(json_err)?;
            }
            ConditionKind::PanicTrigger(panic) => {
                row.panic_config_json = Some(to_json(panic).map_err(json_err)?);
            }
            ConditionKind::GroupConfirmation => {}
        }
        Ok(row)
    }
}

fn condition_from_row(row: &Row<'_>) -> rusqlite::Result<TriggerCondition> {
    let condition_type: ConditionType = get_enum(row, 3)?;
    let kind = match condition_type {
        ConditionType::NoCheckIn
        | ConditionType::RecurringCheckIn
        | ConditionType::InactivityToDate => {
            let window = CheckInWindow {
                hours: row.get::<_, Option<u32>>(6)?.unwrap_or(0),
                minutes: row.get::<_, Option<u32>>(7)?.unwrap_or(0),
                last_checked_at: get_opt_ts(row, 5)?,
            };
            match condition_type {
                ConditionType::NoCheckIn => ConditionKind::NoCheckIn(window),
                ConditionType::RecurringCheckIn => ConditionKind::RecurringCheckIn(window),
                _ => ConditionKind::InactivityToDate(window),
            }
        }
        ConditionType::ScheduledDate => ConditionKind::ScheduledDate {
            trigger_at: get_ts(row, 8)?,
            recurring: get_opt_json(row, 9)?,
        },
        ConditionType::PanicTrigger => {
            ConditionKind::PanicTrigger(get_opt_json::<PanicConfig>(row, 12)?.unwrap_or_default())
        }
        ConditionType::GroupConfirmation => ConditionKind::GroupConfirmation,
    };

    Ok(TriggerCondition {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        kind,
        active: row.get(4)?,
        reminder_minutes: get_json(row, 10)?,
        recipients: get_json(row, 11)?,
        security: get_json(row, 13)?,
        created_at: get_ts(row, 14)?,
        updated_at: get_ts(row, 15)?,
    })
}

/// Insert a new condition.
pub async fn insert_condition(
    db: &Database,
    condition: &TriggerCondition,
) -> Result<(), LastwordError> {
    let row = ConditionRow::encode(condition)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conditions (id, message_id, user_id, condition_type, active,
                    last_checked_at, hours_threshold, minutes_threshold, trigger_at,
                    recurring_pattern, reminder_minutes, recipients_json, panic_config_json,
                    security_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    row.id,
                    row.message_id,
                    row.user_id,
                    row.condition_type,
                    row.active,
                    row.last_checked_at,
                    row.hours_threshold,
                    row.minutes_threshold,
                    row.trigger_at,
                    row.recurring_pattern,
                    row.reminder_minutes,
                    row.recipients_json,
                    row.panic_config_json,
                    row.security_json,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite every column of an existing condition except `id` and `created_at`.
pub async fn update_condition(
    db: &Database,
    condition: &TriggerCondition,
) -> Result<(), LastwordError> {
    let row = ConditionRow::encode(condition)?;
    let id = row.id.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conditions SET message_id = ?2, user_id = ?3, condition_type = ?4,
                    active = ?5, last_checked_at = ?6, hours_threshold = ?7,
                    minutes_threshold = ?8, trigger_at = ?9, recurring_pattern = ?10,
                    reminder_minutes = ?11, recipients_json = ?12, panic_config_json = ?13,
                    security_json = ?14, updated_at = ?15
                 WHERE id = ?1",
                params![
                    row.id,
                    row.message_id,
                    row.user_id,
                    row.condition_type,
                    row.active,
                    row.last_checked_at,
                    row.hours_threshold,
                    row.minutes_threshold,
                    row.trigger_at,
                    row.recurring_pattern,
                    row.reminder_minutes,
                    row.recipients_json,
                    row.panic_config_json,
                    row.security_json,
                    row.updated_at,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(LastwordError::NotFound {
            entity: "condition",
            id,
        });
    }
    Ok(())
}

/// Get a condition by ID.
pub async fn get_condition(
    db: &Database,
    id: &str,
) -> Result<Option<TriggerCondition>, LastwordError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM conditions WHERE id = ?1"))?;
            match stmt.query_row(params![id], condition_from_row) {
                Ok(condition) => Ok(Some(condition)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// The single active condition of a message, if any.
pub async fn active_condition_for_message(
    db: &Database,
    message_id: &str,
) -> Result<Option<TriggerCondition>, LastwordError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conditions WHERE message_id = ?1 AND active = 1"
            ))?;
            match stmt.query_row(params![message_id], condition_from_row) {
                Ok(condition) => Ok(Some(condition)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Active panic conditions of a user, oldest first.
pub async fn active_panic_conditions(
    db: &Database,
    user_id: &str,
) -> Result<Vec<TriggerCondition>, LastwordError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conditions
                 WHERE user_id = ?1 AND active = 1 AND condition_type = 'panic_trigger'
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], condition_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Active check-in conditions, across all users or for one.
pub async fn active_check_in_conditions(
    db: &Database,
    user_id: Option<&str>,
) -> Result<Vec<TriggerCondition>, LastwordError> {
    let user_id = user_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conditions
                 WHERE active = 1
                   AND condition_type IN ('no_check_in', 'recurring_check_in', 'inactivity_to_date')
                   AND (?1 IS NULL OR user_id = ?1)
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], condition_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Make one condition the active condition of its message, deactivating
/// its siblings in the same transaction.
pub async fn activate_condition(
    db: &Database,
    condition_id: &str,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    let condition_id = condition_id.to_string();
    let missing_id = condition_id.clone();
    let now = ts(&now);
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let message_id: Option<String> = match tx.query_row(
                "SELECT message_id FROM conditions WHERE id = ?1",
                params![condition_id],
                |row| row.get(0),
            ) {
                Ok(id) => Some(id),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e),
            };
            let Some(message_id) = message_id else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE conditions SET active = 0, updated_at = ?3
                 WHERE message_id = ?1 AND id <> ?2 AND active = 1",
                params![message_id, condition_id, now],
            )?;
            tx.execute(
                "UPDATE conditions SET active = 1, updated_at = ?2 WHERE id = ?1",
                params![condition_id, now],
            )?;
            tx.commit()?;
            Ok(Some(()))
        })
        .await
        .map_err(map_tr_err)?;
    found.ok_or(LastwordError::NotFound {
        entity: "condition",
        id: missing_id,
    })
}

/// Clear the active flag of a condition.
pub async fn deactivate_condition(
    db: &Database,
    condition_id: &str,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    let id = condition_id.to_string();
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conditions SET active = 0, updated_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
