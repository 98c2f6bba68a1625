// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule entry operations: regeneration, the atomic claim queue, and
//! the terminal transitions out of `processing`.

use chrono::{DateTime, Utc};
use lastword_core::{
    ClaimRequest, EntryDraft, EntryStats, EntryStatus, LastwordError, RegenerateOutcome,
    ScheduleEntry,
};
use rusqlite::{Row, Transaction, TransactionBehavior, params};

use crate::codec::{get_enum, get_opt_ts, get_ts, ts};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, message_id, condition_id, scheduled_at, entry_kind, status,
    delivery_priority, retry_count, last_attempt_at, created_at, updated_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        id: row.get(0)?,
        message_id: row.get(1)?,
        condition_id: row.get(2)?,
        scheduled_at: get_ts(row, 3)?,
        kind: get_enum(row, 4)?,
        status: get_enum(row, 5)?,
        delivery_priority: row.get(6)?,
        retry_count: row.get(7)?,
        last_attempt_at: get_opt_ts(row, 8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

/// Encoded draft, ready to cross onto the connection thread.
struct DraftRow {
    message_id: String,
    condition_id: String,
    scheduled_at: String,
    kind: String,
    priority: i32,
}

fn encode_drafts(drafts: &[EntryDraft]) -> Vec<DraftRow> {
    drafts
        .iter()
        .map(|d| DraftRow {
            message_id: d.message_id.clone(),
            condition_id: d.condition_id.clone(),
            scheduled_at: ts(&d.scheduled_at),
            kind: d.kind.to_string(),
            priority: d.delivery_priority,
        })
        .collect()
}

/// Insert-or-ignore every draft on the dedup key. Returns rows inserted.
fn insert_drafts(tx: &Transaction<'_>, drafts: &[DraftRow], now: &str) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO schedule_entries
            (message_id, condition_id, scheduled_at, entry_kind, status,
             delivery_priority, retry_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, 0, ?6, ?6)",
    )?;
    let mut inserted = 0;
    for d in drafts {
        inserted += stmt.execute(params![
            d.message_id,
            d.condition_id,
            d.scheduled_at,
            d.kind,
            d.priority,
            now
        ])?;
    }
    Ok(inserted)
}

/// Obsolete the pending schedule of one (message, condition) pair and
/// insert a fresh one, atomically.
///
/// Rows already `processing`, `sent` or `failed` are left alone, and a draft
/// whose key matches one of them is skipped by the dedup index.
pub async fn replace_pending_entries(
    db: &Database,
    message_id: &str,
    condition_id: &str,
    drafts: &[EntryDraft],
    now: DateTime<Utc>,
) -> Result<RegenerateOutcome, LastwordError> {
    let message_id = message_id.to_string();
    let condition_id = condition_id.to_string();
    let rows = encode_drafts(drafts);
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let obsoleted = tx.execute(
                "UPDATE schedule_entries SET status = 'obsolete', updated_at = ?3
                 WHERE message_id = ?1 AND condition_id = ?2 AND status = 'pending'",
                params![message_id, condition_id, now],
            )?;
            let inserted = insert_drafts(&tx, &rows, &now)?;
            tx.commit()?;
            Ok(RegenerateOutcome {
                obsoleted,
                inserted,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Insert drafts that do not collide with an existing non-obsolete row.
pub async fn insert_entries_if_absent(
    db: &Database,
    drafts: &[EntryDraft],
    now: DateTime<Utc>,
) -> Result<usize, LastwordError> {
    let rows = encode_drafts(drafts);
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = insert_drafts(&tx, &rows, &now)?;
            tx.commit()?;
            Ok(inserted)
        })
        .await
        .map_err(map_tr_err)
}

/// Obsolete the pending entries of a message, optionally for one condition.
pub async fn obsolete_pending_entries(
    db: &Database,
    message_id: &str,
    condition_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<usize, LastwordError> {
    let message_id = message_id.to_string();
    let condition_id = condition_id.map(str::to_string);
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE schedule_entries SET status = 'obsolete', updated_at = ?3
                 WHERE message_id = ?1 AND status = 'pending'
                   AND (?2 IS NULL OR condition_id = ?2)",
                params![message_id, condition_id, now],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Atomically claim up to `limit` pending entries.
///
/// Runs as a single `UPDATE ... RETURNING` inside a `BEGIN IMMEDIATE`
/// transaction, so the write lock is held from selection to transition.
/// Concurrent claimers on other connections wait on `busy_timeout` and then
/// see the rows as `processing`, which partitions the due set disjointly.
pub async fn claim_due_entries(
    db: &Database,
    request: &ClaimRequest,
) -> Result<Vec<ScheduleEntry>, LastwordError> {
    let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
    let message_id = request.message_id.clone();
    let force = request.force_send;
    let now = ts(&request.now);
    let draft_condition = request.draft.as_ref().map(|d| d.condition_id.clone());
    let draft_at = request.draft.as_ref().map(|d| ts(&d.scheduled_at));
    let draft_kind = request.draft.as_ref().map(|d| d.kind.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut claimed = {
                let mut stmt = tx.prepare(&format!(
                    "UPDATE schedule_entries
                     SET status = 'processing', last_attempt_at = ?1, updated_at = ?1
                     WHERE id IN (
                         SELECT id FROM schedule_entries
                         WHERE status = 'pending'
                           AND (?2 OR scheduled_at <= ?1)
                           AND (?3 IS NULL OR message_id = ?3)
                           AND (?5 IS NULL OR (condition_id = ?5
                                AND scheduled_at = ?6 AND entry_kind = ?7))
                         ORDER BY delivery_priority DESC, scheduled_at ASC, id ASC
                         LIMIT ?4
                     )
                     RETURNING {COLUMNS}"
                ))?;
                let rows = stmt.query_map(
                    params![
                        now,
                        force,
                        message_id,
                        limit,
                        draft_condition,
                        draft_at,
                        draft_kind
                    ],
                    entry_from_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            tx.commit()?;
            // RETURNING order is unspecified.
            claimed.sort_by(|a, b| {
                b.delivery_priority
                    .cmp(&a.delivery_priority)
                    .then(a.scheduled_at.cmp(&b.scheduled_at))
                    .then(a.id.cmp(&b.id))
            });
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Transition a claimed entry to a terminal or pending status.
async fn finish_processing(
    db: &Database,
    id: i64,
    status: EntryStatus,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    let status = status.to_string();
    let now = ts(&now);
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE schedule_entries SET status = ?2, updated_at = ?3
                 WHERE id = ?1 AND status = 'processing'",
                params![id, status, now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        tracing::debug!(entry_id = id, "entry was not processing; transition skipped");
    }
    Ok(())
}

pub async fn mark_entry_sent(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    finish_processing(db, id, EntryStatus::Sent, now).await
}

pub async fn mark_entry_failed(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    finish_processing(db, id, EntryStatus::Failed, now).await
}

pub async fn mark_entry_obsolete(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    finish_processing(db, id, EntryStatus::Obsolete, now).await
}

/// Hand a claimed entry back without consuming a retry.
pub async fn release_entry(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
) -> Result<(), LastwordError> {
    finish_processing(db, id, EntryStatus::Pending, now).await
}

/// Count a failed attempt.
///
/// Increments `retry_count`. If it reaches `max_retries` the entry becomes
/// `failed`; otherwise it returns to `pending` for a later claim.
pub async fn record_entry_failure(
    db: &Database,
    id: i64,
    max_retries: u32,
    now: DateTime<Utc>,
) -> Result<EntryStatus, LastwordError> {
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let retry_count: u32 = tx.query_row(
                "SELECT retry_count FROM schedule_entries WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let retry_count = retry_count + 1;
            let status = if retry_count >= max_retries {
                EntryStatus::Failed
            } else {
                EntryStatus::Pending
            };
            tx.execute(
                "UPDATE schedule_entries SET status = ?2, retry_count = ?3, updated_at = ?4
                 WHERE id = ?1 AND status = 'processing'",
                params![id, status.to_string(), retry_count, now],
            )?;
            tx.commit()?;
            Ok(status)
        })
        .await
        .map_err(map_tr_err)
}

/// Reset `processing` entries whose last attempt is older than `older_than`.
pub async fn reset_stuck_entries(
    db: &Database,
    older_than: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<usize, LastwordError> {
    let older_than = ts(&older_than);
    let now = ts(&now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE schedule_entries
                 SET status = 'pending', last_attempt_at = NULL, updated_at = ?2
                 WHERE status = 'processing'
                   AND (last_attempt_at IS NULL OR last_attempt_at < ?1)",
                params![older_than, now],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Get an entry by ID.
pub async fn get_entry(db: &Database, id: i64) -> Result<Option<ScheduleEntry>, LastwordError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM schedule_entries WHERE id = ?1"))?;
            match stmt.query_row(params![id], entry_from_row) {
                Ok(entry) => Ok(Some(entry)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Every entry of a message, including history, in schedule order.
pub async fn list_entries(
    db: &Database,
    message_id: &str,
) -> Result<Vec<ScheduleEntry>, LastwordError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM schedule_entries
                 WHERE message_id = ?1 ORDER BY scheduled_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![message_id], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Counts for the stats snapshot.
pub async fn entry_stats(
    db: &Database,
    now: DateTime<Utc>,
    recent_since: DateTime<Utc>,
) -> Result<EntryStats, LastwordError> {
    let now = ts(&now);
    let since = ts(&recent_since);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT
                    COALESCE(SUM(status = 'pending' AND scheduled_at <= ?1), 0),
                    COALESCE(SUM(status = 'processing'), 0),
                    COALESCE(SUM(status = 'sent' AND updated_at >= ?2), 0),
                    COALESCE(SUM(status = 'failed' AND updated_at >= ?2), 0)
                 FROM schedule_entries",
                params![now, since],
                |row| {
                    Ok(EntryStats {
                        due_count: row.get::<_, i64>(0)?.max(0) as u64,
                        processing_count: row.get::<_, i64>(1)?.max(0) as u64,
                        sent_recent: row.get::<_, i64>(2)?.max(0) as u64,
                        failed_recent: row.get::<_, i64>(3)?.max(0) as u64,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}
