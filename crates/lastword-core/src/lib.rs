// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lastword delivery engine.
//!
//! This crate provides the domain types (conditions, schedule entries,
//! delivery records), the error type, the clock abstraction and the adapter
//! traits that storage and delivery channels implement.

pub mod clock;
pub mod condition;
pub mod delivery;
pub mod error;
pub mod schedule;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{
    CheckInWindow, ConditionKind, ConditionType, Location, PanicConfig, Recipient,
    RecurringEvery, RecurringPattern, SecurityOptions, TriggerCondition,
};
pub use delivery::{
    ChannelKind, DeliveryLogRecord, DeliveryStatus, MessageRecord, Owner, PanicSignal, SentRecord,
};
pub use error::LastwordError;
pub use schedule::{
    ClaimRequest, EntryDraft, EntryKind, EntryStats, EntryStatus, RegenerateOutcome,
    ScheduleEntry,
};
pub use types::{AdapterType, ChannelReceipt, HealthStatus, OutboundEmail, OutboundText};

pub use traits::{EmailChannel, MessagingChannel, PluginAdapter, StorageAdapter};
