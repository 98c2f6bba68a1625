// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero limits, valid hosts, and channel credentials that must be
//! supplied together.

use crate::diagnostic::ConfigError;
use crate::model::LastwordConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LastwordConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |key: &str, message: String| {
        errors.push(ConfigError::Validation {
            key: key.to_string(),
            message,
        });
    };

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        invalid(
            "service.log_level",
            format!(
                "`{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path", "must not be empty".to_string());
    }

    let scheduler = &config.scheduler;
    if scheduler.batch_limit == 0 {
        invalid("scheduler.batch_limit", "must be at least 1".to_string());
    }
    if scheduler.max_retries == 0 {
        invalid("scheduler.max_retries", "must be at least 1".to_string());
    }
    if scheduler.max_concurrent_dispatch == 0 {
        invalid(
            "scheduler.max_concurrent_dispatch",
            "must be at least 1".to_string(),
        );
    }
    if scheduler.channel_timeout_secs == 0 {
        invalid(
            "scheduler.channel_timeout_secs",
            "must be at least 1".to_string(),
        );
    }
    if scheduler.tick_interval_secs == 0 {
        invalid(
            "scheduler.tick_interval_secs",
            "must be at least 1".to_string(),
        );
    }
    // A stuck window shorter than a channel timeout would reclaim live work.
    if scheduler.stuck_after_secs <= scheduler.channel_timeout_secs {
        invalid(
            "scheduler.stuck_after_secs",
            format!(
                "must exceed scheduler.channel_timeout_secs ({}), got {}",
                scheduler.channel_timeout_secs, scheduler.stuck_after_secs
            ),
        );
    }

    if config.panic.selection_ttl_secs == 0 {
        invalid("panic.selection_ttl_secs", "must be at least 1".to_string());
    }

    let email = &config.email;
    if email.smtp_host.is_some() && email.from_address.is_none() {
        invalid(
            "email.from_address",
            "required when email.smtp_host is set".to_string(),
        );
    }
    if email.smtp_username.is_some() != email.smtp_password.is_some() {
        invalid(
            "email.smtp_password",
            "smtp_username and smtp_password must be set together".to_string(),
        );
    }

    let sms = &config.sms;
    if sms.account_sid.is_some() && (sms.auth_token.is_none() || sms.from_number.is_none()) {
        invalid(
            "sms.auth_token",
            "auth_token and from_number are required when sms.account_sid is set".to_string(),
        );
    }
    if !sms.api_base.starts_with("http://") && !sms.api_base.starts_with("https://") {
        invalid(
            "sms.api_base",
            format!("`{}` is not an http(s) URL", sms.api_base),
        );
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        invalid("gateway.host", "must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            invalid(
                "gateway.host",
                format!("`{host}` is not a valid IP address or hostname"),
            );
        }
    }
    if config
        .gateway
        .bearer_token
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        invalid(
            "gateway.bearer_token",
            "must not be blank; remove it to disable auth".to_string(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = LastwordConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = LastwordConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["storage.database_path"]);
    }

    #[test]
    fn zero_limits_are_all_reported() {
        let mut config = LastwordConfig::default();
        config.scheduler.batch_limit = 0;
        config.scheduler.max_retries = 0;
        config.panic.selection_ttl_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        let keys = keys(&errors);
        assert!(keys.contains(&"scheduler.batch_limit".to_string()));
        assert!(keys.contains(&"scheduler.max_retries".to_string()));
        assert!(keys.contains(&"panic.selection_ttl_secs".to_string()));
    }

    #[test]
    fn stuck_window_must_exceed_channel_timeout() {
        let mut config = LastwordConfig::default();
        config.scheduler.stuck_after_secs = 20;
        config.scheduler.channel_timeout_secs = 30;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["scheduler.stuck_after_secs"]);
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = LastwordConfig::default();
        config.service.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["service.log_level"]);
    }

    #[test]
    fn smtp_host_requires_sender() {
        let mut config = LastwordConfig::default();
        config.email.smtp_host = Some("smtp.example.com".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["email.from_address"]);

        config.email.from_address = Some("Lastword <noreply@example.com>".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn twilio_credentials_must_be_complete() {
        let mut config = LastwordConfig::default();
        config.sms.account_sid = Some("AC123".to_string());
        assert!(validate_config(&config).is_err());

        config.sms.auth_token = Some("secret".to_string());
        config.sms.from_number = Some("+15550001111".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn invalid_gateway_host_fails() {
        let mut config = LastwordConfig::default();
        config.gateway.host = "not a host!".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["gateway.host"]);
    }

    #[test]
    fn scheduler_section_deny_unknown_fields() {
        let toml_str = r#"
[scheduler]
batch_limit = 10
max_retires = 2
"#;
        assert!(toml::from_str::<LastwordConfig>(toml_str).is_err());
    }

    #[test]
    fn optional_policies_default_to_unset() {
        let config: LastwordConfig = toml::from_str("[scheduler]\nbatch_limit = 5\n").unwrap();
        assert_eq!(config.scheduler.batch_limit, 5);
        assert_eq!(config.scheduler.stale_reminder_minutes, None);
        assert_eq!(config.scheduler.final_notice_minutes, None);
        assert_eq!(config.scheduler.max_retries, 3);
    }
}
