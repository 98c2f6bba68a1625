// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lastword integration tests.
//!
//! Provides channel doubles and a harness that wires a real SQLite store and
//! a manual clock into an [`Engine`](lastword_scheduler::Engine), so whole
//! processing cycles run without a network or wall-clock waits.
//!
//! # Components
//!
//! - [`MockEmailChannel`] / [`MockMessagingChannel`] - capture, fail or hang on send
//! - [`TestHarness`] - temp database, clock, mocks and engine in one place

pub mod harness;
pub mod mock_channel;

pub use harness::TestHarness;
pub use mock_channel::{MockEmailChannel, MockMessagingChannel};
