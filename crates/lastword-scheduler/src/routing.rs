// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Who receives an entry.
//!
//! Reminders and final notices on check-in conditions go to the owner only;
//! they ask the owner to check in and must never reach the recipients.
//! Everything else goes to the condition's configured recipients.

use serde::Serialize;

use lastword_core::{EntryKind, Owner, ScheduleEntry, TriggerCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Owner,
    Recipients,
}

pub fn audience(entry_kind: EntryKind, condition: &TriggerCondition) -> Audience {
    match entry_kind {
        EntryKind::Reminder | EntryKind::FinalNotice if condition.kind.is_check_in() => {
            Audience::Owner
        }
        _ => Audience::Recipients,
    }
}

/// A person plus the addresses a dispatch may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl Target {
    pub fn is_reachable(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
            || self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Resolve the targets for `entry`. Unreachable targets are dropped.
pub fn resolve_targets(
    entry: &ScheduleEntry,
    condition: &TriggerCondition,
    owner: &Owner,
) -> Vec<Target> {
    let targets = match audience(entry.kind, condition) {
        Audience::Owner => vec![Target {
            name: owner.name.clone(),
            email: owner.email.clone(),
            phone: owner.phone.clone(),
        }],
        Audience::Recipients => condition
            .recipients
            .iter()
            .map(|r| Target {
                name: r.name.clone(),
                email: r.email.clone(),
                phone: r.phone.clone(),
            })
            .collect(),
    };
    targets.into_iter().filter(Target::is_reachable).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{check_in_condition, entry_for, owner, t0};
    use lastword_core::{ConditionKind, Recipient};

    #[test]
    fn check_in_reminders_reach_only_the_owner() {
        let condition = check_in_condition("c1", "m1");
        for kind in [EntryKind::Reminder, EntryKind::FinalNotice] {
            let entry = entry_for(&condition, kind, t0());
            let targets = resolve_targets(&entry, &condition, &owner());
            assert_eq!(targets.len(), 1);
            assert_eq!(targets[0].email, owner().email);
        }
    }

    #[test]
    fn final_delivery_reaches_only_recipients() {
        let condition = check_in_condition("c1", "m1");
        let entry = entry_for(&condition, EntryKind::FinalDelivery, t0());
        let targets = resolve_targets(&entry, &condition, &owner());
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].email.as_deref(), Some("rae@example.com"));
        assert!(targets.iter().all(|t| t.email != owner().email));
    }

    #[test]
    fn reminders_on_dated_conditions_go_to_recipients() {
        let mut condition = check_in_condition("c1", "m1");
        condition.kind = ConditionKind::ScheduledDate {
            trigger_at: t0(),
            recurring: None,
        };
        assert_eq!(audience(EntryKind::Reminder, &condition), Audience::Recipients);
    }

    #[test]
    fn recipients_without_contact_details_are_dropped() {
        let mut condition = check_in_condition("c1", "m1");
        condition.recipients.push(Recipient {
            id: "r2".into(),
            name: "Nobody".into(),
            email: Some("  ".into()),
            phone: None,
        });
        let entry = entry_for(&condition, EntryKind::FinalDelivery, t0());
        assert_eq!(resolve_targets(&entry, &condition, &owner()).len(), 1);
    }
}
