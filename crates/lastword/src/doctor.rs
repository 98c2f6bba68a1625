// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lastword doctor` command implementation.
//!
//! Opens storage, builds every configured channel and runs their health
//! checks, printing one line per check.

use std::time::{Duration, Instant};

use lastword_config::model::LastwordConfig;
use lastword_core::{HealthStatus, LastwordError, PluginAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn line(&self) -> String {
        let tag = match self.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<12} {} ({}ms)",
            self.name,
            self.message,
            self.duration.as_millis()
        )
    }
}

pub async fn run_doctor(config: &LastwordConfig) -> Result<(), LastwordError> {
    let mut results = Vec::new();

    let started = Instant::now();
    match crate::app::open_storage(config).await {
        Ok(storage) => results.push(check_adapter("storage", storage.as_ref()).await),
        Err(e) => results.push(CheckResult {
            name: "storage".into(),
            status: CheckStatus::Fail,
            message: e.to_string(),
            duration: started.elapsed(),
        }),
    }

    let started = Instant::now();
    match crate::app::build_channels(config) {
        Ok(channels) => {
            match &channels.email {
                Some(email) => results.push(check_adapter("email", email.as_ref()).await),
                None => results.push(not_configured("email")),
            }
            match &channels.messaging {
                Some(messaging) => {
                    results.push(check_adapter("messaging", messaging.as_ref()).await)
                }
                None => results.push(not_configured("messaging")),
            }
        }
        Err(e) => results.push(CheckResult {
            name: "channels".into(),
            status: CheckStatus::Fail,
            message: e.to_string(),
            duration: started.elapsed(),
        }),
    }

    println!();
    println!("  lastword doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", result.line());
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failures > 0 {
        return Err(LastwordError::Internal(format!(
            "{failures} health check(s) failed"
        )));
    }
    println!("  All checks passed.");
    Ok(())
}

fn not_configured(name: &str) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status: CheckStatus::Warn,
        message: "not configured".to_string(),
        duration: Duration::ZERO,
    }
}

async fn check_adapter<A: PluginAdapter + ?Sized>(name: &str, adapter: &A) -> CheckResult {
    let started = Instant::now();
    let (status, message) = match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => (CheckStatus::Pass, format!("{} healthy", adapter.name())),
        Ok(HealthStatus::Degraded(why)) => {
            (CheckStatus::Warn, format!("{}: {why}", adapter.name()))
        }
        Ok(HealthStatus::Unhealthy(why)) => {
            (CheckStatus::Fail, format!("{}: {why}", adapter.name()))
        }
        Err(e) => (CheckStatus::Fail, e.to_string()),
    };
    CheckResult {
        name: name.to_string(),
        status,
        message,
        duration: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lastword_test_utils::{MockEmailChannel, mock_channel::MockBehavior};

    #[tokio::test]
    async fn adapter_health_maps_to_check_status() {
        let channel = MockEmailChannel::new();
        let result = check_adapter("email", &channel).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("mock-email"));

        channel
            .set_behavior(MockBehavior::Fail("relay refused".into()))
            .await;
        let result = check_adapter("email", &channel).await;
        assert_eq!(result.status, CheckStatus::Fail);
        assert!(result.line().starts_with("    [FAIL] email"));
    }

    #[tokio::test]
    async fn doctor_passes_with_storage_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LastwordConfig::default();
        config.storage.database_path = dir.path().join("lw.db").to_string_lossy().into_owned();
        assert!(run_doctor(&config).await.is_ok());
    }
}
