// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger conditions: the rule that decides when a message is delivered.
//!
//! Each condition kind carries only the fields it needs. Persistence flattens
//! the union into one row; see `lastword-storage::queries::conditions`.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Discriminator stored in the `condition_type` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    NoCheckIn,
    RecurringCheckIn,
    InactivityToDate,
    ScheduledDate,
    PanicTrigger,
    GroupConfirmation,
}

impl ConditionType {
    /// Kinds whose deadline is driven by the owner checking in.
    pub fn is_check_in(&self) -> bool {
        matches!(
            self,
            ConditionType::NoCheckIn
                | ConditionType::RecurringCheckIn
                | ConditionType::InactivityToDate
        )
    }
}

/// Check-in threshold shared by the check-in kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInWindow {
    pub hours: u32,
    pub minutes: u32,
    /// `None` until the condition is armed for the first time.
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl CheckInWindow {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self {
            hours,
            minutes,
            last_checked_at: None,
        }
    }

    /// Total time the owner has between check-ins.
    pub fn threshold(&self) -> Duration {
        Duration::hours(i64::from(self.hours)) + Duration::minutes(i64::from(self.minutes))
    }
}

/// Calendar step for a recurring scheduled delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecurringEvery {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Repeat rule for `scheduled_date` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub every: RecurringEvery,
    /// Step multiplier; `0` is treated as `1`.
    #[serde(default = "one")]
    pub interval: u32,
}

fn one() -> u32 {
    1
}

impl RecurringPattern {
    /// Advance `from` by one step of this pattern.
    pub fn step(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let n = self.interval.max(1);
        match self.every {
            RecurringEvery::Daily => Some(from + Duration::days(i64::from(n))),
            RecurringEvery::Weekly => Some(from + Duration::weeks(i64::from(n))),
            RecurringEvery::Monthly => from.checked_add_months(Months::new(n)),
            RecurringEvery::Yearly => from.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }

    /// First occurrence strictly after `after`, starting from `anchor`.
    pub fn next_after(&self, anchor: DateTime<Utc>, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut next = anchor;
        // Bounded walk; a daily pattern anchored decades back still terminates.
        for _ in 0..100_000 {
            if next > after {
                return Some(next);
            }
            next = self.step(next)?;
        }
        None
    }
}

/// Geographic fix attached to an emergency signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

impl Location {
    pub fn map_link(&self) -> String {
        format!(
            "https://maps.google.com/?q={:.6},{:.6}",
            self.latitude, self.longitude
        )
    }
}

/// Panic-button specific configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanicConfig {
    /// Word the owner sends to fire this condition, if it should be narrowed.
    #[serde(default)]
    pub keyword: Option<String>,
    /// Keep the condition armed after it fires.
    #[serde(default)]
    pub keep_armed: bool,
    #[serde(default)]
    pub last_location: Option<Location>,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl PanicConfig {
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        self.keyword
            .as_deref()
            .is_some_and(|k| k.trim().eq_ignore_ascii_case(keyword.trim()))
    }
}

/// Per-kind condition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionKind {
    NoCheckIn(CheckInWindow),
    RecurringCheckIn(CheckInWindow),
    InactivityToDate(CheckInWindow),
    ScheduledDate {
        trigger_at: DateTime<Utc>,
        #[serde(default)]
        recurring: Option<RecurringPattern>,
    },
    PanicTrigger(PanicConfig),
    GroupConfirmation,
}

impl ConditionKind {
    pub fn condition_type(&self) -> ConditionType {
        match self {
            ConditionKind::NoCheckIn(_) => ConditionType::NoCheckIn,
            ConditionKind::RecurringCheckIn(_) => ConditionType::RecurringCheckIn,
            ConditionKind::InactivityToDate(_) => ConditionType::InactivityToDate,
            ConditionKind::ScheduledDate { .. } => ConditionType::ScheduledDate,
            ConditionKind::PanicTrigger(_) => ConditionType::PanicTrigger,
            ConditionKind::GroupConfirmation => ConditionType::GroupConfirmation,
        }
    }

    pub fn is_check_in(&self) -> bool {
        self.condition_type().is_check_in()
    }

    pub fn check_in_window(&self) -> Option<&CheckInWindow> {
        match self {
            ConditionKind::NoCheckIn(w)
            | ConditionKind::RecurringCheckIn(w)
            | ConditionKind::InactivityToDate(w) => Some(w),
            _ => None,
        }
    }

    pub fn check_in_window_mut(&mut self) -> Option<&mut CheckInWindow> {
        match self {
            ConditionKind::NoCheckIn(w)
            | ConditionKind::RecurringCheckIn(w)
            | ConditionKind::InactivityToDate(w) => Some(w),
            _ => None,
        }
    }

    pub fn panic_config(&self) -> Option<&PanicConfig> {
        match self {
            ConditionKind::PanicTrigger(p) => Some(p),
            _ => None,
        }
    }

    pub fn panic_config_mut(&mut self) -> Option<&mut PanicConfig> {
        match self {
            ConditionKind::PanicTrigger(p) => Some(p),
            _ => None,
        }
    }
}

/// A recipient snapshot stored on the condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Access restrictions shown alongside the delivered message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityOptions {
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub unlock_delay_hours: Option<u32>,
    #[serde(default)]
    pub expires_after_days: Option<u32>,
}

/// The rule determining when a message is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub id: String,
    pub message_id: String,
    /// Owner of the message; the person who must check in.
    pub user_id: String,
    pub kind: ConditionKind,
    pub active: bool,
    /// Reminder lead-times in minutes before the deadline.
    pub reminder_minutes: Vec<u32>,
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub security: SecurityOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TriggerCondition {
    /// New inactive condition with a random id.
    pub fn new(
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        kind: ConditionKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            kind,
            active: false,
            reminder_minutes: Vec::new(),
            recipients: Vec::new(),
            security: SecurityOptions::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_reminders(mut self, minutes: Vec<u32>) -> Self {
        self.reminder_minutes = minutes;
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn condition_type(&self) -> ConditionType {
        self.kind.condition_type()
    }

    pub fn last_checked_at(&self) -> Option<DateTime<Utc>> {
        self.kind.check_in_window().and_then(|w| w.last_checked_at)
    }

    /// Whether the condition stays armed after its final delivery.
    pub fn keep_armed(&self) -> bool {
        self.kind.panic_config().is_some_and(|p| p.keep_armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn condition_type_round_trips_through_strings() {
        use std::str::FromStr;
        for t in [
            ConditionType::NoCheckIn,
            ConditionType::RecurringCheckIn,
            ConditionType::InactivityToDate,
            ConditionType::ScheduledDate,
            ConditionType::PanicTrigger,
            ConditionType::GroupConfirmation,
        ] {
            let s = t.to_string();
            assert_eq!(ConditionType::from_str(&s).unwrap(), t);
        }
        assert_eq!(ConditionType::NoCheckIn.to_string(), "no_check_in");
    }

    #[test]
    fn only_check_in_kinds_report_check_in() {
        assert!(ConditionType::NoCheckIn.is_check_in());
        assert!(ConditionType::InactivityToDate.is_check_in());
        assert!(!ConditionType::ScheduledDate.is_check_in());
        assert!(!ConditionType::PanicTrigger.is_check_in());
        assert!(!ConditionType::GroupConfirmation.is_check_in());
    }

    #[test]
    fn monthly_pattern_clamps_to_month_end() {
        let p = RecurringPattern {
            every: RecurringEvery::Monthly,
            interval: 1,
        };
        let jan31 = Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap();
        let next = p.step(jan31).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 28, 9, 0, 0).unwrap());
    }

    #[test]
    fn next_after_skips_past_occurrences() {
        let p = RecurringPattern {
            every: RecurringEvery::Weekly,
            interval: 1,
        };
        let anchor = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let next = p.next_after(anchor, after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 22, 8, 0, 0).unwrap());
    }

    #[test]
    fn keyword_matching_ignores_case_and_padding() {
        let cfg = PanicConfig {
            keyword: Some("Help".into()),
            ..PanicConfig::default()
        };
        assert!(cfg.matches_keyword(" HELP "));
        assert!(!cfg.matches_keyword("sos"));
        assert!(!PanicConfig::default().matches_keyword("help"));
    }

    #[test]
    fn keep_armed_only_applies_to_panic_kind() {
        let now = Utc::now();
        let panic = TriggerCondition::new(
            "m1",
            "u1",
            ConditionKind::PanicTrigger(PanicConfig {
                keep_armed: true,
                ..PanicConfig::default()
            }),
            now,
        );
        assert!(panic.keep_armed());

        let check_in =
            TriggerCondition::new("m1", "u1", ConditionKind::NoCheckIn(CheckInWindow::new(24, 0)), now);
        assert!(!check_in.keep_armed());
    }

    proptest::proptest! {
        #[test]
        fn next_after_is_strictly_later(offset_days in 0i64..2000, interval in 1u32..6) {
            let p = RecurringPattern { every: RecurringEvery::Daily, interval };
            let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let after = anchor + Duration::days(offset_days);
            let next = p.next_after(anchor, after).unwrap();
            proptest::prop_assert!(next > after);
            proptest::prop_assert!(next - after <= Duration::days(i64::from(interval)));
        }
    }
}
