// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles storage, channels and the engine from configuration.

use std::sync::Arc;

use lastword_config::model::LastwordConfig;
use lastword_core::{
    EmailChannel, LastwordError, MessagingChannel, StorageAdapter, SystemClock,
};
use lastword_email::SmtpEmailChannel;
use lastword_scheduler::{Channels, Engine, EngineSettings};
use lastword_sms::TwilioChannel;
use lastword_storage::SqliteStorage;
use tracing::{info, warn};

pub async fn open_storage(
    config: &LastwordConfig,
) -> Result<Arc<dyn StorageAdapter + Send + Sync>, LastwordError> {
    let storage = SqliteStorage::open(config.storage.clone()).await?;
    info!(path = %config.storage.database_path, "storage opened");
    Ok(Arc::new(storage))
}

/// Channels for every section that is configured. An unconfigured channel
/// stays `None` and its sends are logged as failed attempts.
pub fn build_channels(config: &LastwordConfig) -> Result<Channels, LastwordError> {
    let mut channels = Channels::default();

    if config.email.smtp_host.is_some() {
        let email: Arc<dyn EmailChannel + Send + Sync> =
            Arc::new(SmtpEmailChannel::from_config(&config.email)?);
        channels.email = Some(email);
    } else {
        warn!("email.smtp_host not set; email delivery disabled");
    }

    if config.sms.account_sid.is_some() {
        let messaging: Arc<dyn MessagingChannel + Send + Sync> =
            Arc::new(TwilioChannel::from_config(&config.sms)?);
        channels.messaging = Some(messaging);
    } else {
        warn!("sms.account_sid not set; messaging delivery disabled");
    }

    Ok(channels)
}

pub async fn build_engine(config: &LastwordConfig) -> Result<Engine, LastwordError> {
    let storage = open_storage(config).await?;
    let channels = build_channels(config)?;
    Ok(Engine::new(
        storage,
        channels,
        Arc::new(SystemClock),
        EngineSettings::from_config(config),
    ))
}
