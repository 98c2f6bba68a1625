// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery channels (email, SMS/WhatsApp).
//!
//! Implementations must be safe to retry and must return a definite result;
//! the dispatcher additionally bounds every call with a timeout.

use async_trait::async_trait;

use crate::error::LastwordError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelReceipt, OutboundEmail, OutboundText};

#[async_trait]
pub trait EmailChannel: PluginAdapter {
    /// Sends one HTML email.
    async fn send(&self, email: OutboundEmail) -> Result<ChannelReceipt, LastwordError>;
}

#[async_trait]
pub trait MessagingChannel: PluginAdapter {
    /// Sends one plain-text message to a phone number.
    async fn send(&self, text: OutboundText) -> Result<ChannelReceipt, LastwordError>;
}
