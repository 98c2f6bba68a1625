// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lastword delivery engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Lastword configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LastwordConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Processing cycle, retry and staleness settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Panic selection flow settings.
    #[serde(default)]
    pub panic: PanicConfig,

    /// SMTP email channel settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// Twilio SMS/WhatsApp channel settings.
    #[serde(default)]
    pub sms: SmsConfig,

    /// HTTP invocation surface settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Name used in outbound email signatures and logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "lastword".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("lastword").join("lastword.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("lastword.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Processing cycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Maximum entries claimed per cycle.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Failed attempts before an entry is marked permanently `failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Age after which a `processing` entry is considered abandoned.
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,

    /// Upper bound on a single channel send.
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,

    /// Fixed staleness limit for reminders. When unset, a reminder is stale
    /// once it is later than its own lead time.
    #[serde(default)]
    pub stale_reminder_minutes: Option<u32>,

    /// Lead time of the owner-facing final notice for check-in conditions.
    #[serde(default)]
    pub final_notice_minutes: Option<u32>,

    /// Interval between processing cycles in `lastword serve`.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Window used for the `sent_recent` and `failed_recent` stats.
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: u32,

    /// A (entry, recipient, channel) already sent within this window is not re-sent.
    #[serde(default = "default_idempotency_window_minutes")]
    pub idempotency_window_minutes: u32,

    /// Claimed entries dispatched concurrently within one cycle.
    #[serde(default = "default_max_concurrent_dispatch")]
    pub max_concurrent_dispatch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            max_retries: default_max_retries(),
            stuck_after_secs: default_stuck_after_secs(),
            channel_timeout_secs: default_channel_timeout_secs(),
            stale_reminder_minutes: None,
            final_notice_minutes: None,
            tick_interval_secs: default_tick_interval_secs(),
            recent_window_hours: default_recent_window_hours(),
            idempotency_window_minutes: default_idempotency_window_minutes(),
            max_concurrent_dispatch: default_max_concurrent_dispatch(),
        }
    }
}

fn default_batch_limit() -> usize {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_stuck_after_secs() -> u64 {
    600
}

fn default_channel_timeout_secs() -> u64 {
    30
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_recent_window_hours() -> u32 {
    24
}

fn default_idempotency_window_minutes() -> u32 {
    60
}

fn default_max_concurrent_dispatch() -> usize {
    4
}

/// Panic selection flow configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PanicConfig {
    /// How long a multi-match selection waits for a reply.
    #[serde(default = "default_selection_ttl_secs")]
    pub selection_ttl_secs: u64,
}

impl Default for PanicConfig {
    fn default() -> Self {
        Self {
            selection_ttl_secs: default_selection_ttl_secs(),
        }
    }
}

fn default_selection_ttl_secs() -> u64 {
    300
}

/// SMTP email channel configuration. The channel is disabled without a host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// SMTP relay host.
    #[serde(default)]
    pub smtp_host: Option<String>,

    /// SMTP port (STARTTLS).
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    /// Sender address, e.g. `Lastword <noreply@example.com>`.
    #[serde(default)]
    pub from_address: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Twilio messaging channel configuration. Disabled without an account SID.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number in E.164 form.
    #[serde(default)]
    pub from_number: Option<String>,

    /// Send via WhatsApp (`whatsapp:` address prefix) instead of SMS.
    #[serde(default)]
    pub whatsapp: bool,

    /// API base URL. Overridable for tests.
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            whatsapp: false,
            api_base: default_twilio_api_base(),
        }
    }
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Whether `lastword serve` starts the HTTP surface.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. Open when unset.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3100
}
