// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! Each [`Database`] serializes its statements through tokio-rusqlite's single
//! background thread. Several `Database` handles may point at the same file
//! (one per worker process); cross-handle safety comes from SQLite locking
//! plus `busy_timeout`.

use std::path::Path;
use std::time::Duration;

use lastword_config::model::StorageConfig;
use lastword_core::LastwordError;
use tracing::debug;

use crate::migrations;

/// Convert tokio-rusqlite errors to [`LastwordError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> LastwordError {
    LastwordError::Storage {
        source: format!("database error: {e}").into(),
    }
}

/// Handle to one SQLite database file.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open with WAL mode and a 5 second busy timeout, running migrations.
    pub async fn open(path: &str) -> Result<Self, LastwordError> {
        let config = StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        };
        Self::open_with(&config).await
    }

    /// Open the database described by `config`, running migrations.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, LastwordError> {
        let path = config.database_path.clone();
        if let Some(parent) = Path::new(&path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(LastwordError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| LastwordError::Storage {
                source: format!("failed to open {path}: {e}").into(),
            })?;

        let wal_mode = config.wal_mode;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(busy_timeout)?;
            if wal_mode {
                // journal_mode returns a row, so it cannot go through execute_batch.
                let _mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), LastwordError> { migrations::run_migrations(conn) })
            .await
            .map_err(|e| LastwordError::Storage {
                source: format!("migration failed: {e}").into(),
            })?;

        debug!(path = %path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), LastwordError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| LastwordError::Storage {
            source: format!("failed to close database: {e}").into(),
        })
    }
}
