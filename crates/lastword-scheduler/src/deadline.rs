// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadline calculation and the staleness policy shared by the generator
//! and the dispatcher.

use chrono::{DateTime, Duration, Utc};

use lastword_core::{ConditionKind, TriggerCondition};

/// The instant a condition's final delivery becomes due, if it has one.
///
/// - `scheduled_date`: the explicit trigger instant.
/// - check-in kinds: last check-in plus the threshold; `None` until the
///   first check-in (or arm) sets a baseline.
/// - `panic_trigger` and `group_confirmation`: never time-driven.
pub fn deadline(condition: &TriggerCondition) -> Option<DateTime<Utc>> {
    deadline_for(&condition.kind)
}

pub fn deadline_for(kind: &ConditionKind) -> Option<DateTime<Utc>> {
    match kind {
        ConditionKind::ScheduledDate { trigger_at, .. } => Some(*trigger_at),
        ConditionKind::NoCheckIn(window)
        | ConditionKind::RecurringCheckIn(window)
        | ConditionKind::InactivityToDate(window) => window
            .last_checked_at
            .and_then(|last| last.checked_add_signed(window.threshold())),
        ConditionKind::PanicTrigger(_) => None,
        ConditionKind::GroupConfirmation => None,
    }
}

/// When a pre-deadline entry is too late to be worth sending.
///
/// Without a fixed limit, an entry is stale once it is more than its own
/// lead time (deadline minus scheduled time) in the past.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StalenessPolicy {
    fixed: Option<Duration>,
}

impl StalenessPolicy {
    pub fn lead_time() -> Self {
        Self { fixed: None }
    }

    pub fn fixed(limit: Duration) -> Self {
        Self { fixed: Some(limit) }
    }

    pub fn from_minutes(minutes: Option<u32>) -> Self {
        Self {
            fixed: minutes.map(|m| Duration::minutes(i64::from(m))),
        }
    }

    /// Maximum lateness tolerated for an entry with the given lead time.
    pub fn tolerance(&self, lead: Duration) -> Duration {
        self.fixed.unwrap_or(lead).max(Duration::zero())
    }

    pub fn is_stale(
        &self,
        scheduled_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        let lead = deadline
            .map(|d| d - scheduled_at)
            .unwrap_or_else(Duration::zero);
        now - scheduled_at > self.tolerance(lead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lastword_core::{CheckInWindow, PanicConfig, RecurringEvery, RecurringPattern};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
    }

    fn check_in(hours: u32, minutes: u32, last: Option<DateTime<Utc>>) -> ConditionKind {
        let mut window = CheckInWindow::new(hours, minutes);
        window.last_checked_at = last;
        ConditionKind::NoCheckIn(window)
    }

    #[test]
    fn check_in_deadline_adds_both_thresholds() {
        let kind = check_in(24, 30, Some(t0()));
        assert_eq!(
            deadline_for(&kind),
            Some(t0() + Duration::hours(24) + Duration::minutes(30))
        );
    }

    #[test]
    fn check_in_without_baseline_has_no_deadline() {
        assert_eq!(deadline_for(&check_in(24, 0, None)), None);
    }

    #[test]
    fn scheduled_date_uses_trigger_instant() {
        let kind = ConditionKind::ScheduledDate {
            trigger_at: t0(),
            recurring: Some(RecurringPattern {
                every: RecurringEvery::Yearly,
                interval: 1,
            }),
        };
        assert_eq!(deadline_for(&kind), Some(t0()));
    }

    #[test]
    fn signal_driven_kinds_have_no_deadline() {
        assert_eq!(
            deadline_for(&ConditionKind::PanicTrigger(PanicConfig::default())),
            None
        );
        assert_eq!(deadline_for(&ConditionKind::GroupConfirmation), None);
    }

    #[test]
    fn lead_time_policy_tolerates_one_window() {
        let policy = StalenessPolicy::lead_time();
        let deadline = t0() + Duration::hours(2);
        let scheduled = deadline - Duration::minutes(60);

        assert!(!policy.is_stale(scheduled, Some(deadline), scheduled + Duration::minutes(60)));
        assert!(policy.is_stale(scheduled, Some(deadline), scheduled + Duration::minutes(61)));
    }

    #[test]
    fn fixed_policy_ignores_lead() {
        let policy = StalenessPolicy::from_minutes(Some(10));
        let deadline = t0() + Duration::days(1);
        let scheduled = deadline - Duration::hours(12);

        assert!(!policy.is_stale(scheduled, Some(deadline), scheduled + Duration::minutes(10)));
        assert!(policy.is_stale(scheduled, Some(deadline), scheduled + Duration::minutes(11)));
    }

    proptest::proptest! {
        #[test]
        fn deadline_is_deterministic(
            hours in 0u32..10_000,
            minutes in 0u32..600,
            offset_secs in 0i64..400_000_000,
        ) {
            let last = Utc.timestamp_opt(1_600_000_000 + offset_secs, 0).unwrap();
            let kind = check_in(hours, minutes, Some(last));
            let first = deadline_for(&kind);
            let second = deadline_for(&kind.clone());
            proptest::prop_assert_eq!(first, second);
            proptest::prop_assert_eq!(
                first,
                Some(last + Duration::hours(i64::from(hours)) + Duration::minutes(i64::from(minutes)))
            );
        }
    }
}
