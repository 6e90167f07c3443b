//! Durable queue of pending actions.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{ActionId, ActionStatus, PendingAction};

/// Exponential backoff for failed actions.
///
/// The delay before an action's next attempt is
/// `base_delay_ms * 2^retry_count`, capped at `max_delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on the delay in milliseconds.
    pub max_delay_ms: u64,
}

impl BackoffPolicy {
    /// Returns the delay to wait after `retry_count` failed attempts.
    #[must_use]
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry_count);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::milliseconds(ms as i64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

/// Per-status action counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Actions waiting for their first attempt.
    pub pending: usize,
    /// Actions with a network attempt running.
    pub in_flight: usize,
    /// Actions waiting out a backoff delay.
    pub failed: usize,
    /// Actions that exhausted their retries.
    pub abandoned: usize,
}

impl QueueCounts {
    /// Total number of actions in the queue.
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.in_flight + self.failed + self.abandoned
    }

    /// Number of actions that may still be delivered automatically.
    #[must_use]
    pub fn live(&self) -> usize {
        self.pending + self.in_flight + self.failed
    }
}

/// An ordered queue of pending actions.
///
/// The queue maintains enqueue order and decides which actions are
/// eligible for a drain attempt. It holds no locks and does no I/O; the
/// sync engine wraps it and mirrors it to durable storage.
///
/// # Invariants
///
/// - Entries stay in `created_at` order
/// - At most one action per `(resource, target_id)` is in flight at a time
/// - An earlier action for a target always gets its attempt before a later
///   one; an abandoned action no longer gates its target
#[derive(Debug, Default)]
pub struct ActionQueue {
    entries: VecDeque<PendingAction>,
}

impl ActionQueue {
    /// Creates a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from persisted actions.
    ///
    /// Actions are re-ordered by creation time, and actions that were in
    /// flight when the process died are released back to pending; a dead
    /// process cannot have an attempt running.
    #[must_use]
    pub fn from_actions(mut actions: Vec<PendingAction>) -> Self {
        for action in &mut actions {
            action.release();
        }
        actions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Self {
            entries: actions.into(),
        }
    }

    /// Appends an action to the queue.
    pub fn enqueue(&mut self, action: PendingAction) {
        self.entries.push_back(action);
    }

    /// Returns the IDs of actions eligible for an attempt at `now`.
    ///
    /// Walks the queue oldest-first. The first live action per
    /// `(resource, target_id)` claims that target; later actions for the
    /// same target are held back regardless of their own status. A claimed
    /// action is returned when it is pending, or failed with its backoff
    /// delay elapsed.
    #[must_use]
    pub fn eligible(&self, now: DateTime<Utc>, backoff: &BackoffPolicy) -> Vec<ActionId> {
        let mut claimed: HashSet<(&str, &str)> = HashSet::new();
        let mut ready = Vec::new();

        for action in &self.entries {
            if action.status.is_abandoned() {
                continue;
            }
            if !claimed.insert((action.resource.as_str(), action.target_id.as_str())) {
                continue;
            }
            match action.status {
                ActionStatus::Pending => ready.push(action.id),
                ActionStatus::Failed => {
                    let ready_at = action
                        .last_attempt_at
                        .map_or(now, |at| at + backoff.delay_for(action.retry_count));
                    if now >= ready_at {
                        ready.push(action.id);
                    }
                }
                ActionStatus::InFlight | ActionStatus::Abandoned => {}
            }
        }

        ready
    }

    /// Marks an action as in flight as of `now`.
    ///
    /// Returns `false` if the action is unknown or not in a retryable
    /// state.
    pub fn mark_in_flight(&mut self, id: ActionId, now: DateTime<Utc>) -> bool {
        match self.entry_mut(id) {
            Some(action) if action.status.is_retryable() => {
                action.begin_attempt(now);
                true
            }
            _ => false,
        }
    }

    /// Removes a confirmed action from the queue and returns it.
    pub fn complete(&mut self, id: ActionId) -> Option<PendingAction> {
        let index = self.entries.iter().position(|a| a.id == id)?;
        self.entries.remove(index)
    }

    /// Records a failed attempt for an action.
    ///
    /// Returns the action's new status, or `None` if the ID is unknown.
    pub fn record_failure(&mut self, id: ActionId, max_retries: u32) -> Option<ActionStatus> {
        self.entry_mut(id)
            .map(|action| action.record_failure(max_retries))
    }

    /// Releases one in-flight action back to pending without consuming a
    /// retry.
    ///
    /// Used when an attempt was refused before any I/O happened.
    pub fn release(&mut self, id: ActionId) -> bool {
        match self.entry_mut(id) {
            Some(action) if action.status == ActionStatus::InFlight => {
                action.release();
                true
            }
            _ => false,
        }
    }

    /// Releases every in-flight action back to pending.
    ///
    /// Used when a drain pass aborts as a whole, e.g. on auth failure.
    pub fn release_in_flight(&mut self) {
        for action in &mut self.entries {
            action.release();
        }
    }

    /// Removes an action regardless of its status and returns it.
    ///
    /// This is the manual-resolution path for abandoned actions.
    pub fn discard(&mut self, id: ActionId) -> Option<PendingAction> {
        self.complete(id)
    }

    /// Returns the action with the given ID, if present.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<&PendingAction> {
        self.entries.iter().find(|a| a.id == id)
    }

    /// Iterates over all actions in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingAction> {
        self.entries.iter()
    }

    /// Returns the abandoned actions in queue order.
    #[must_use]
    pub fn abandoned(&self) -> Vec<&PendingAction> {
        self.entries
            .iter()
            .filter(|a| a.status.is_abandoned())
            .collect()
    }

    /// Returns per-status counts.
    #[must_use]
    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for action in &self.entries {
            match action.status {
                ActionStatus::Pending => counts.pending += 1,
                ActionStatus::InFlight => counts.in_flight += 1,
                ActionStatus::Failed => counts.failed += 1,
                ActionStatus::Abandoned => counts.abandoned += 1,
            }
        }
        counts
    }

    /// Returns the total number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the queue holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all actions.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn entry_mut(&mut self, id: ActionId) -> Option<&mut PendingAction> {
        self.entries.iter_mut().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionPayload;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(seconds)
    }

    fn action(target: &str, created: DateTime<Utc>) -> PendingAction {
        PendingAction::new("posts", target, ActionPayload::Delete, created)
    }

    fn backoff() -> BackoffPolicy {
        BackoffPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = backoff();
        assert_eq!(policy.delay_for(0), Duration::seconds(1));
        assert_eq!(policy.delay_for(1), Duration::seconds(2));
        assert_eq!(policy.delay_for(2), Duration::seconds(4));
        assert_eq!(policy.delay_for(10), Duration::seconds(60));
        // Huge retry counts must not overflow
        assert_eq!(policy.delay_for(u32::MAX), Duration::seconds(60));
    }

    #[test]
    fn fresh_actions_are_eligible_oldest_first() {
        let mut queue = ActionQueue::new();
        let a = action("p1", at(0));
        let b = action("p2", at(1));
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());

        assert_eq!(queue.eligible(at(2), &backoff()), vec![a.id, b.id]);
    }

    #[test]
    fn only_first_action_per_target_is_eligible() {
        let mut queue = ActionQueue::new();
        let first = action("p1", at(0));
        let second = action("p1", at(1));
        queue.enqueue(first.clone());
        queue.enqueue(second.clone());

        assert_eq!(queue.eligible(at(2), &backoff()), vec![first.id]);
    }

    #[test]
    fn same_target_different_resource_does_not_block() {
        let mut queue = ActionQueue::new();
        let post = action("1", at(0));
        let job = PendingAction::new("jobs", "1", ActionPayload::Delete, at(1));
        queue.enqueue(post.clone());
        queue.enqueue(job.clone());

        assert_eq!(queue.eligible(at(2), &backoff()), vec![post.id, job.id]);
    }

    #[test]
    fn in_flight_blocks_its_target() {
        let mut queue = ActionQueue::new();
        let first = action("p1", at(0));
        let second = action("p1", at(1));
        queue.enqueue(first.clone());
        queue.enqueue(second);

        assert!(queue.mark_in_flight(first.id, at(2)));
        assert!(queue.eligible(at(2), &backoff()).is_empty());
    }

    #[test]
    fn failed_action_waits_out_backoff() {
        let mut queue = ActionQueue::new();
        let act = action("p1", at(0));
        queue.enqueue(act.clone());

        queue.mark_in_flight(act.id, at(0));
        assert_eq!(
            queue.record_failure(act.id, 3),
            Some(ActionStatus::Failed)
        );

        // retry_count = 1 so the delay is 2 seconds from the attempt
        assert!(queue.eligible(at(1), &backoff()).is_empty());
        assert_eq!(queue.eligible(at(2), &backoff()), vec![act.id]);
    }

    #[test]
    fn backoff_wait_still_blocks_later_same_target_actions() {
        let mut queue = ActionQueue::new();
        let first = action("p1", at(0));
        let second = action("p1", at(1));
        queue.enqueue(first.clone());
        queue.enqueue(second);

        queue.mark_in_flight(first.id, at(2));
        queue.record_failure(first.id, 3);

        // First is waiting out backoff; second must not jump the line
        assert!(queue.eligible(at(3), &backoff()).is_empty());
    }

    #[test]
    fn abandoned_action_stops_gating_its_target() {
        let mut queue = ActionQueue::new();
        let first = action("p1", at(0));
        let second = action("p1", at(1));
        queue.enqueue(first.clone());
        queue.enqueue(second.clone());

        queue.mark_in_flight(first.id, at(2));
        assert_eq!(
            queue.record_failure(first.id, 1),
            Some(ActionStatus::Abandoned)
        );

        assert_eq!(queue.eligible(at(3), &backoff()), vec![second.id]);
    }

    #[test]
    fn complete_removes_action() {
        let mut queue = ActionQueue::new();
        let act = action("p1", at(0));
        queue.enqueue(act.clone());

        let removed = queue.complete(act.id).unwrap();
        assert_eq!(removed.id, act.id);
        assert!(queue.is_empty());
        assert!(queue.complete(act.id).is_none());
    }

    #[test]
    fn retry_ceiling_reaches_abandoned_exactly_at_max() {
        let mut queue = ActionQueue::new();
        let act = action("p1", at(0));
        queue.enqueue(act.clone());

        for attempt in 1..=3 {
            queue.mark_in_flight(act.id, at(attempt));
            let status = queue.record_failure(act.id, 3).unwrap();
            if attempt < 3 {
                assert_eq!(status, ActionStatus::Failed);
            } else {
                assert_eq!(status, ActionStatus::Abandoned);
            }
        }

        assert_eq!(queue.get(act.id).unwrap().retry_count, 3);
        // Never eligible again
        assert!(queue.eligible(at(10_000), &backoff()).is_empty());
    }

    #[test]
    fn mark_in_flight_rejects_abandoned() {
        let mut queue = ActionQueue::new();
        let act = action("p1", at(0));
        queue.enqueue(act.clone());

        queue.mark_in_flight(act.id, at(0));
        queue.record_failure(act.id, 1);
        assert!(!queue.mark_in_flight(act.id, at(5)));
    }

    #[test]
    fn release_returns_one_action_without_consuming_retry() {
        let mut queue = ActionQueue::new();
        let a = action("p1", at(0));
        let b = action("p2", at(0));
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());

        queue.mark_in_flight(a.id, at(1));
        queue.mark_in_flight(b.id, at(1));
        assert!(queue.release(a.id));

        let released = queue.get(a.id).unwrap();
        assert_eq!(released.status, ActionStatus::Pending);
        assert_eq!(released.retry_count, 0);
        assert_eq!(queue.get(b.id).unwrap().status, ActionStatus::InFlight);
        // Releasing a non-in-flight action is a no-op
        assert!(!queue.release(a.id));
    }

    #[test]
    fn release_in_flight_returns_all_to_pending() {
        let mut queue = ActionQueue::new();
        let a = action("p1", at(0));
        let b = action("p2", at(0));
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());

        queue.mark_in_flight(a.id, at(1));
        queue.mark_in_flight(b.id, at(1));
        queue.release_in_flight();

        let counts = queue.counts();
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.in_flight, 0);
    }

    #[test]
    fn from_actions_sorts_and_releases() {
        let mut newer = action("p1", at(10));
        newer.begin_attempt(at(11));
        let older = action("p2", at(5));

        let queue = ActionQueue::from_actions(vec![newer.clone(), older.clone()]);

        let order: Vec<ActionId> = queue.iter().map(|a| a.id).collect();
        assert_eq!(order, vec![older.id, newer.id]);
        assert_eq!(queue.counts().in_flight, 0);
        assert_eq!(queue.counts().pending, 2);
    }

    #[test]
    fn discard_removes_abandoned_action() {
        let mut queue = ActionQueue::new();
        let act = action("p1", at(0));
        queue.enqueue(act.clone());
        queue.mark_in_flight(act.id, at(0));
        queue.record_failure(act.id, 1);

        assert_eq!(queue.abandoned().len(), 1);
        let removed = queue.discard(act.id).unwrap();
        assert_eq!(removed.status, ActionStatus::Abandoned);
        assert!(queue.is_empty());
    }

    #[test]
    fn counts_by_status() {
        let mut queue = ActionQueue::new();
        let a = action("p1", at(0));
        let b = action("p2", at(0));
        let c = action("p3", at(0));
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.enqueue(c.clone());

        queue.mark_in_flight(b.id, at(1));
        queue.mark_in_flight(c.id, at(1));
        queue.record_failure(c.id, 5);

        let counts = queue.counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.in_flight, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.abandoned, 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.live(), 3);
    }
}
