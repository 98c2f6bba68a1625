// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only delivery audit log.

use chrono::{DateTime, Utc};
use lastword_core::{ChannelKind, DeliveryLogRecord, LastwordError};
use rusqlite::params;

use crate::codec::{get_enum, get_opt_json, get_ts, to_json, ts};
use crate::database::{Database, map_tr_err};

/// Append one attempt record. Rows are never updated.
pub async fn append_delivery_log(
    db: &Database,
    record: &DeliveryLogRecord,
) -> Result<(), LastwordError> {
    let record = record.clone();
    let response = record
        .response
        .as_ref()
        .map(to_json)
        .transpose()
        .map_err(LastwordError::storage)?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_log (entry_id, message_id, condition_id, recipient,
                    channel, status, error, response_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.entry_id,
                    record.message_id,
                    record.condition_id,
                    record.recipient,
                    record.channel.to_string(),
                    record.status.to_string(),
                    record.error,
                    response,
                    ts(&record.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Whether this (entry, recipient, channel) was sent successfully since `since`.
pub async fn recent_successful_attempt(
    db: &Database,
    entry_id: i64,
    recipient: &str,
    channel: ChannelKind,
    since: DateTime<Utc>,
) -> Result<bool, LastwordError> {
    let recipient = recipient.to_string();
    let channel = channel.to_string();
    let since = ts(&since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM delivery_log
                    WHERE entry_id = ?1 AND recipient = ?2 AND channel = ?3
                      AND status = 'sent' AND created_at >= ?4
                 )",
                params![entry_id, recipient, channel, since],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// All attempts for one entry, oldest first.
pub async fn delivery_log_for_entry(
    db: &Database,
    entry_id: i64,
) -> Result<Vec<DeliveryLogRecord>, LastwordError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entry_id, message_id, condition_id, recipient, channel, status,
                        error, response_json, created_at
                 FROM delivery_log WHERE entry_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![entry_id], |row| {
                Ok(DeliveryLogRecord {
                    id: Some(row.get(0)?),
                    entry_id: row.get(1)?,
                    message_id: row.get(2)?,
                    condition_id: row.get(3)?,
                    recipient: row.get(4)?,
                    channel: get_enum(row, 5)?,
                    status: get_enum(row, 6)?,
                    error: row.get(7)?,
                    response: get_opt_json(row, 8)?,
                    created_at: get_ts(row, 9)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
