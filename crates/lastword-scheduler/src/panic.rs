// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Panic trigger.
//!
//! An inbound panic signal fires the user's armed `panic_trigger` condition
//! immediately. When several are armed the user is asked to pick one; the
//! pending question lives in a [`SelectionStore`] keyed by user and expires
//! after a configurable TTL. Selection state is in memory only and is lost
//! on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use lastword_core::{
    ClaimRequest, Clock, LastwordError, Location, PanicSignal, StorageAdapter, TriggerCondition,
};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::generator::immediate_final_delivery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub condition_id: String,
    pub message_id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
struct PendingSelection {
    candidates: Vec<Candidate>,
    location: Option<Location>,
    expires_at: DateTime<Utc>,
}

/// Result of feeding a reply into the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionReply {
    Chosen {
        candidate: Candidate,
        location: Option<Location>,
    },
    Cancelled,
    Expired,
    /// The reply matched nothing; the selection stays open.
    Invalid { candidates: Vec<Candidate> },
    NoneOpen,
}

/// Pending panic selections keyed by user id.
pub struct SelectionStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    pending: Mutex<HashMap<String, PendingSelection>>,
}

impl SelectionStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or replace) the user's selection. Returns its expiry.
    pub fn open(
        &self,
        user_id: &str,
        candidates: Vec<Candidate>,
        location: Option<Location>,
    ) -> DateTime<Utc> {
        let expires_at = self.clock.now() + self.ttl;
        self.lock().insert(
            user_id.to_string(),
            PendingSelection {
                candidates,
                location,
                expires_at,
            },
        );
        expires_at
    }

    pub fn resolve(&self, user_id: &str, reply: &str) -> SelectionReply {
        let now = self.clock.now();
        let mut pending = self.lock();
        let Some(selection) = pending.get(user_id) else {
            return SelectionReply::NoneOpen;
        };
        if selection.expires_at <= now {
            pending.remove(user_id);
            return SelectionReply::Expired;
        }

        let reply = reply.trim();
        if reply.eq_ignore_ascii_case("cancel") {
            pending.remove(user_id);
            return SelectionReply::Cancelled;
        }
        let choice = reply
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|i| *i < selection.candidates.len());
        match choice {
            Some(index) => match pending.remove(user_id) {
                Some(mut selection) => SelectionReply::Chosen {
                    candidate: selection.candidates.swap_remove(index),
                    location: selection.location,
                },
                None => SelectionReply::NoneOpen,
            },
            None => SelectionReply::Invalid {
                candidates: selection.candidates.clone(),
            },
        }
    }

    /// Drop expired selections. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, s| s.expires_at > now);
        before - pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingSelection>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PanicOutcome {
    NoActiveCondition,
    /// The final delivery was claimed and dispatched.
    Triggered {
        message_id: String,
        dispatch: DispatchOutcome,
    },
    /// The final delivery is queued but another worker claimed it first.
    Queued { message_id: String },
    SelectionRequired {
        prompt: String,
        titles: Vec<String>,
        expires_at: DateTime<Utc>,
    },
    Cancelled,
    Expired,
    InvalidChoice { prompt: String },
    NoPendingSelection,
}

pub struct PanicFlow {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<Dispatcher>,
    selections: SelectionStore,
}

impl PanicFlow {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<Dispatcher>,
        selection_ttl: Duration,
    ) -> Self {
        let selections = SelectionStore::new(selection_ttl, clock.clone());
        Self {
            storage,
            clock,
            dispatcher,
            selections,
        }
    }

    pub fn selections(&self) -> &SelectionStore {
        &self.selections
    }

    /// Handle an inbound panic signal.
    pub async fn trigger(&self, signal: PanicSignal) -> Result<PanicOutcome, LastwordError> {
        let armed = self.storage.active_panic_conditions(&signal.user_id).await?;
        let candidates = narrow_by_keyword(armed, signal.keyword.as_deref());

        match candidates.len() {
            0 => {
                info!(user_id = %signal.user_id, "panic signal with no armed condition");
                Ok(PanicOutcome::NoActiveCondition)
            }
            1 => self.fire(&candidates[0].id, signal.location).await,
            n => {
                let mut listed = Vec::with_capacity(n);
                for condition in &candidates {
                    listed.push(self.candidate(condition).await?);
                }
                let prompt = selection_prompt(&listed);
                let titles = listed.iter().map(|c| c.title.clone()).collect();
                let expires_at = self
                    .selections
                    .open(&signal.user_id, listed, signal.location);
                info!(user_id = %signal.user_id, candidates = n, "panic selection opened");
                Ok(PanicOutcome::SelectionRequired {
                    prompt,
                    titles,
                    expires_at,
                })
            }
        }
    }

    /// Handle a reply to an open selection.
    pub async fn reply(&self, user_id: &str, text: &str) -> Result<PanicOutcome, LastwordError> {
        match self.selections.resolve(user_id, text) {
            SelectionReply::Chosen {
                candidate,
                location,
            } => self.fire(&candidate.condition_id, location).await,
            SelectionReply::Cancelled => {
                info!(%user_id, "panic selection cancelled");
                Ok(PanicOutcome::Cancelled)
            }
            SelectionReply::Expired => Ok(PanicOutcome::Expired),
            SelectionReply::Invalid { candidates } => Ok(PanicOutcome::InvalidChoice {
                prompt: selection_prompt(&candidates),
            }),
            SelectionReply::NoneOpen => Ok(PanicOutcome::NoPendingSelection),
        }
    }

    async fn fire(
        &self,
        condition_id: &str,
        location: Option<Location>,
    ) -> Result<PanicOutcome, LastwordError> {
        let now = self.clock.now();
        // Re-read: the condition may have been disarmed while a selection was open.
        let Some(mut condition) = self
            .storage
            .get_condition(condition_id)
            .await?
            .filter(|c| c.active)
        else {
            return Ok(PanicOutcome::NoActiveCondition);
        };

        if let Some(panic) = condition.kind.panic_config_mut() {
            if location.is_some() {
                panic.last_location = location;
            }
            panic.last_triggered_at = Some(now);
        }
        condition.updated_at = now;
        self.storage.update_condition(&condition).await?;

        // A new trigger supersedes deliveries still waiting on a retry.
        let superseded = self
            .storage
            .obsolete_pending_entries(&condition.message_id, Some(&condition.id), now)
            .await?;
        if superseded > 0 {
            info!(%condition_id, superseded, "pending panic deliveries superseded");
        }

        let draft = immediate_final_delivery(&condition, now);
        self.storage
            .insert_entries_if_absent(std::slice::from_ref(&draft), now)
            .await?;

        let request = ClaimRequest::for_draft(&draft, now);
        let Some(entry) = self.storage.claim_due_entries(&request).await?.pop() else {
            warn!(%condition_id, "panic delivery queued but claimed elsewhere");
            return Ok(PanicOutcome::Queued {
                message_id: condition.message_id,
            });
        };

        info!(%condition_id, entry_id = entry.id, "panic delivery dispatching");
        let dispatch = self.dispatcher.deliver(entry, true).await;
        Ok(PanicOutcome::Triggered {
            message_id: condition.message_id,
            dispatch,
        })
    }

    async fn candidate(&self, condition: &TriggerCondition) -> Result<Candidate, LastwordError> {
        let title = self
            .storage
            .get_message(&condition.message_id)
            .await?
            .map(|m| m.title)
            .unwrap_or_else(|| condition.message_id.clone());
        Ok(Candidate {
            condition_id: condition.id.clone(),
            message_id: condition.message_id.clone(),
            title,
        })
    }
}

/// Keep the keyword matches when there are any; otherwise keep everything.
fn narrow_by_keyword(
    conditions: Vec<TriggerCondition>,
    keyword: Option<&str>,
) -> Vec<TriggerCondition> {
    let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) else {
        return conditions;
    };
    let matches: Vec<_> = conditions
        .iter()
        .filter(|c| c.kind.panic_config().is_some_and(|p| p.matches_keyword(keyword)))
        .cloned()
        .collect();
    if matches.is_empty() { conditions } else { matches }
}

fn selection_prompt(candidates: &[Candidate]) -> String {
    let mut prompt = String::from("Several messages are armed. Reply with a number to send one:\n");
    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, c.title));
    }
    prompt.push_str("Reply CANCEL to send nothing.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, check_in_condition, t0};
    use lastword_core::{ConditionKind, EntryStatus, ManualClock, PanicConfig};

    fn candidates(n: usize) -> Vec<Candidate> {
        (1..=n)
            .map(|i| Candidate {
                condition_id: format!("c{i}"),
                message_id: format!("m{i}"),
                title: format!("Letter {i}"),
            })
            .collect()
    }

    fn panic_condition(id: &str, message_id: &str, keyword: Option<&str>) -> TriggerCondition {
        let mut condition = check_in_condition(id, message_id);
        condition.kind = ConditionKind::PanicTrigger(PanicConfig {
            keyword: keyword.map(str::to_string),
            ..PanicConfig::default()
        });
        condition.reminder_minutes.clear();
        condition
    }

    #[test]
    fn numeric_reply_selects_and_closes() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = SelectionStore::new(Duration::seconds(300), clock);
        store.open("u1", candidates(3), None);

        match store.resolve("u1", " 2 ") {
            SelectionReply::Chosen { candidate, .. } => assert_eq!(candidate.condition_id, "c2"),
            other => panic!("expected a choice, got {other:?}"),
        }
        assert_eq!(store.resolve("u1", "2"), SelectionReply::NoneOpen);
    }

    #[test]
    fn cancel_is_case_insensitive() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = SelectionStore::new(Duration::seconds(300), clock);
        store.open("u1", candidates(2), None);
        assert_eq!(store.resolve("u1", "Cancel"), SelectionReply::Cancelled);
        assert_eq!(store.resolve("u1", "1"), SelectionReply::NoneOpen);
    }

    #[test]
    fn out_of_range_reply_keeps_selection_open() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = SelectionStore::new(Duration::seconds(300), clock);
        store.open("u1", candidates(2), None);
        assert!(matches!(store.resolve("u1", "3"), SelectionReply::Invalid { .. }));
        assert!(matches!(store.resolve("u1", "zero"), SelectionReply::Invalid { .. }));
        assert!(matches!(store.resolve("u1", "1"), SelectionReply::Chosen { .. }));
    }

    #[test]
    fn selection_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = SelectionStore::new(Duration::seconds(300), clock.clone());
        store.open("u1", candidates(2), None);
        store.open("u2", candidates(2), None);

        clock.advance(Duration::seconds(300));
        assert_eq!(store.resolve("u1", "1"), SelectionReply::Expired);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.resolve("u2", "1"), SelectionReply::NoneOpen);
    }

    #[test]
    fn keyword_narrows_only_when_something_matches() {
        let all = vec![
            panic_condition("c1", "m1", Some("help")),
            panic_condition("c2", "m2", Some("sos")),
            panic_condition("c3", "m3", None),
        ];
        let narrowed = narrow_by_keyword(all.clone(), Some("SOS"));
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].id, "c2");
        assert_eq!(narrow_by_keyword(all.clone(), Some("nope")).len(), 3);
        assert_eq!(narrow_by_keyword(all, None).len(), 3);
    }

    #[tokio::test]
    async fn single_match_delivers_immediately() {
        let fx = Fixture::new().await;
        fx.seed(panic_condition("c1", "m1", None)).await;
        let flow = fx.panic_flow();

        let mut signal = PanicSignal::new("owner-1");
        signal.location = Some(Location {
            latitude: 48.85,
            longitude: 2.35,
            accuracy_m: None,
        });
        let outcome = flow.trigger(signal).await.unwrap();
        match outcome {
            PanicOutcome::Triggered { message_id, dispatch } => {
                assert_eq!(message_id, "m1");
                assert!(dispatch.is_success());
            }
            other => panic!("expected trigger, got {other:?}"),
        }

        let sent = fx.email.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("maps.google.com"));
        let stored = fx.storage.get_condition("c1").await.unwrap().unwrap();
        assert!(!stored.active);
        let panic = stored.kind.panic_config().unwrap();
        assert_eq!(panic.last_triggered_at, Some(t0()));
        assert!(panic.last_location.is_some());
    }

    #[tokio::test]
    async fn keep_armed_condition_stays_active() {
        let fx = Fixture::new().await;
        let mut condition = panic_condition("c1", "m1", None);
        if let Some(p) = condition.kind.panic_config_mut() {
            p.keep_armed = true;
        }
        fx.seed(condition).await;

        let outcome = fx.panic_flow().trigger(PanicSignal::new("owner-1")).await.unwrap();
        assert!(matches!(outcome, PanicOutcome::Triggered { .. }));
        let stored = fx.storage.get_condition("c1").await.unwrap().unwrap();
        assert!(stored.active);
    }

    #[tokio::test]
    async fn retrigger_sends_once_and_supersedes_pending_retry() {
        let fx = Fixture::new().await;
        let mut condition = panic_condition("c1", "m1", None);
        if let Some(p) = condition.kind.panic_config_mut() {
            p.keep_armed = true;
        }
        fx.seed(condition).await;
        let flow = fx.panic_flow();

        fx.email.fail_with("relay down");
        let outcome = flow.trigger(PanicSignal::new("owner-1")).await.unwrap();
        assert!(matches!(
            outcome,
            PanicOutcome::Triggered { ref dispatch, .. } if dispatch.is_failure()
        ));
        let entries = fx.storage.list_entries("m1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Pending);
        let first_id = entries[0].id;

        fx.email.recover();
        fx.clock.advance(Duration::minutes(1));
        let outcome = flow.trigger(PanicSignal::new("owner-1")).await.unwrap();
        let PanicOutcome::Triggered { dispatch, .. } = outcome else {
            panic!("expected trigger, got {outcome:?}");
        };
        assert!(dispatch.is_success());

        let entries = fx.storage.list_entries("m1").await.unwrap();
        let first = entries.iter().find(|e| e.id == first_id).unwrap();
        assert_eq!(first.status, EntryStatus::Obsolete);
        let second = entries.iter().find(|e| e.id != first_id).unwrap();
        assert_eq!(second.status, EntryStatus::Sent);
        assert_eq!(second.scheduled_at, t0() + Duration::minutes(1));

        // A later cycle has nothing left to send.
        let summary = fx.engine().process(Default::default()).await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(fx.email.sent().len(), 1);
    }

    #[tokio::test]
    async fn multiple_matches_require_selection() {
        let fx = Fixture::new().await;
        fx.seed(panic_condition("c1", "m1", None)).await;
        fx.seed(panic_condition("c2", "m2", None)).await;
        let flow = fx.panic_flow();

        let outcome = flow.trigger(PanicSignal::new("owner-1")).await.unwrap();
        let PanicOutcome::SelectionRequired { titles, prompt, .. } = outcome else {
            panic!("expected a selection, got {outcome:?}");
        };
        assert_eq!(titles.len(), 2);
        assert!(prompt.contains("2. "));
        assert!(fx.email.sent().is_empty());

        let outcome = flow.reply("owner-1", "2").await.unwrap();
        assert!(matches!(outcome, PanicOutcome::Triggered { ref message_id, .. } if message_id == "m2"));
        let entries = fx.storage.list_entries("m2").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Sent);
        assert!(fx.storage.list_entries("m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_armed_condition() {
        let fx = Fixture::new().await;
        let outcome = fx.panic_flow().trigger(PanicSignal::new("owner-1")).await.unwrap();
        assert_eq!(outcome, PanicOutcome::NoActiveCondition);
        assert_eq!(
            fx.panic_flow().reply("owner-1", "1").await.unwrap(),
            PanicOutcome::NoPendingSelection
        );
    }
}
