// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes a [`Database`](crate::Database)
//! and runs one unit of work on its connection thread.

pub mod conditions;
pub mod delivery_log;
pub mod directory;
pub mod schedule;
pub mod sent_records;
