// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery channels for deterministic testing.
//!
//! Both mocks capture what they were asked to send. A mock can be switched
//! to fail every send with a channel error, or to hang forever so dispatch
//! timeouts can be exercised with a paused tokio clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use lastword_core::{
    AdapterType, ChannelReceipt, EmailChannel, HealthStatus, LastwordError, MessagingChannel,
    OutboundEmail, OutboundText, PluginAdapter,
};

/// What a mock does on its next send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    Capture,
    Fail(String),
    Hang,
}

/// Payload types a [`MockChannel`] can carry.
pub trait Outbound: Clone + Send + Sync + 'static {
    const ADAPTER: AdapterType;
    const NAME: &'static str;
    fn recipient(&self) -> &str;
}

impl Outbound for OutboundEmail {
    const ADAPTER: AdapterType = AdapterType::Email;
    const NAME: &'static str = "mock-email";
    fn recipient(&self) -> &str {
        &self.to
    }
}

impl Outbound for OutboundText {
    const ADAPTER: AdapterType = AdapterType::Messaging;
    const NAME: &'static str = "mock-messaging";
    fn recipient(&self) -> &str {
        &self.to
    }
}

pub struct MockChannel<T> {
    sent: Arc<Mutex<Vec<T>>>,
    behavior: Arc<Mutex<MockBehavior>>,
    attempts: AtomicUsize,
}

pub type MockEmailChannel = MockChannel<OutboundEmail>;
pub type MockMessagingChannel = MockChannel<OutboundText>;

impl<T: Outbound> MockChannel<T> {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(MockBehavior::Capture)),
            attempts: AtomicUsize::new(0),
        }
    }

    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Fail every subsequent send with a channel error carrying `message`.
    pub async fn fail_with(&self, message: &str) {
        self.set_behavior(MockBehavior::Fail(message.to_string())).await;
    }

    pub async fn hang(&self) {
        self.set_behavior(MockBehavior::Hang).await;
    }

    pub async fn recover(&self) {
        self.set_behavior(MockBehavior::Capture).await;
    }

    /// Everything successfully sent so far, in order.
    pub async fn sent(&self) -> Vec<T> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Sent payloads addressed to `to`.
    pub async fn sent_to(&self, to: &str) -> Vec<T> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|item| item.recipient() == to)
            .cloned()
            .collect()
    }

    /// Number of send calls, including failed and hung ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    async fn deliver(&self, item: T) -> Result<ChannelReceipt, LastwordError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().await.clone();
        match behavior {
            MockBehavior::Capture => {
                let mut sent = self.sent.lock().await;
                sent.push(item);
                Ok(ChannelReceipt::with_id(format!("{}-{}", T::NAME, sent.len())))
            }
            MockBehavior::Fail(message) => Err(LastwordError::channel(message)),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}

impl<T: Outbound> Default for MockChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Outbound> PluginAdapter for MockChannel<T> {
    fn name(&self) -> &str {
        T::NAME
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        T::ADAPTER
    }

    async fn health_check(&self) -> Result<HealthStatus, LastwordError> {
        Ok(match &*self.behavior.lock().await {
            MockBehavior::Capture => HealthStatus::Healthy,
            MockBehavior::Fail(msg) => HealthStatus::Unhealthy(msg.clone()),
            MockBehavior::Hang => HealthStatus::Degraded("hanging".to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), LastwordError> {
        Ok(())
    }
}

#[async_trait]
impl EmailChannel for MockChannel<OutboundEmail> {
    async fn send(&self, email: OutboundEmail) -> Result<ChannelReceipt, LastwordError> {
        self.deliver(email).await
    }
}

#[async_trait]
impl MessagingChannel for MockChannel<OutboundText> {
    async fn send(&self, text: OutboundText) -> Result<ChannelReceipt, LastwordError> {
        self.deliver(text).await
    }
}
