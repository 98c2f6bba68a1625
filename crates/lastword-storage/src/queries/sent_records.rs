// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger of completed final deliveries.

use chrono::{DateTime, Utc};
use lastword_core::{LastwordError, SentRecord};
use rusqlite::params;

use crate::codec::ts;
use crate::database::{Database, map_tr_err};

/// Record a completed final delivery. Returns `false` if it was already recorded.
pub async fn append_sent_record(db: &Database, record: &SentRecord) -> Result<bool, LastwordError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO sent_records
                    (message_id, condition_id, user_id, deadline, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.message_id,
                    record.condition_id,
                    record.user_id,
                    ts(&record.deadline),
                    ts(&record.sent_at),
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn has_sent_record(
    db: &Database,
    message_id: &str,
    condition_id: &str,
    deadline: DateTime<Utc>,
) -> Result<bool, LastwordError> {
    let message_id = message_id.to_string();
    let condition_id = condition_id.to_string();
    let deadline = ts(&deadline);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM sent_records
                    WHERE message_id = ?1 AND condition_id = ?2 AND deadline = ?3
                 )",
                params![message_id, condition_id, deadline],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
