// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Lastword delivery engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, tokio-rusqlite
//! connections, and typed operations for conditions, the schedule claim
//! queue, the delivery log and the sent ledger.

pub mod adapter;
mod codec;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
