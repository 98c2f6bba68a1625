// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling and delivery for the Lastword engine.
//!
//! - [`deadline`] computes when a condition fires.
//! - [`generator`] turns a condition into reminder and delivery entries.
//! - [`dispatcher`] sends one claimed entry over email and messaging.
//! - [`reclaimer`] recovers abandoned and missed work.
//! - [`lifecycle`] arms, disarms and checks in conditions.
//! - [`panic`] handles emergency signals and multi-message selection.
//! - [`engine`] ties them together behind one handle.

pub mod content;
pub mod deadline;
pub mod dispatcher;
pub mod engine;
pub mod generator;
pub mod lifecycle;
pub mod panic;
pub mod reclaimer;
pub mod routing;

#[cfg(test)]
mod test_support;

pub use deadline::{StalenessPolicy, deadline};
pub use dispatcher::{Channels, DispatchOutcome, DispatchSettings, Dispatcher};
pub use engine::{Engine, EngineSettings, EntryReport, ProcessRequest, ProcessSummary};
pub use generator::ScheduleGenerator;
pub use panic::{PanicOutcome, SelectionStore};
pub use reclaimer::ReclaimReport;
pub use routing::{Audience, audience};
