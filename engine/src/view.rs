//! Per-scope live view: the state owned by one mounted live list.
//!
//! The view ties together the scope, its collection, the channel lifecycle
//! and an epoch. Every mount (initial, retarget) gets a new epoch. Work that
//! was started under an older epoch, such as an enrichment fetch that was in
//! flight when the scope changed, is rejected as [`Applied::Stale`] when it
//! completes.

use crate::{
    error::Result, reconcile, Change, ChangeEvent, ChangeOp, ChannelMachine, LiveRecord,
    MergeOutcome, OrderedCollection, ScopeKey,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generation counter for mounts of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeEpoch(u64);

impl ScopeEpoch {
    pub fn value(&self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        ScopeEpoch(self.0 + 1)
    }
}

impl fmt::Display for ScopeEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which change operations a view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReactionPolicy {
    /// Only inserts are applied (default)
    #[default]
    InsertsOnly,
    /// Inserts, updates and deletes are applied
    AllChanges,
}

impl ReactionPolicy {
    pub fn reacts_to(&self, op: ChangeOp) -> bool {
        match self {
            ReactionPolicy::InsertsOnly => op == ChangeOp::Insert,
            ReactionPolicy::AllChanges => true,
        }
    }
}

/// Result of offering a change to a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Reconciliation ran
    Merged(MergeOutcome),
    /// Issued under an epoch that is no longer current; discarded
    Stale,
    /// Record does not belong to the view's scope; discarded
    OutOfScope,
}

/// State of one mounted live list.
#[derive(Debug, Clone)]
pub struct LiveView<R> {
    scope: ScopeKey,
    epoch: ScopeEpoch,
    collection: OrderedCollection<R>,
    channel: ChannelMachine,
    policy: ReactionPolicy,
}

impl<R: LiveRecord> LiveView<R> {
    /// Mount a view for `scope` with an empty collection.
    pub fn new(scope: ScopeKey, policy: ReactionPolicy) -> Self {
        Self {
            scope,
            epoch: ScopeEpoch(1),
            collection: OrderedCollection::new(),
            channel: ChannelMachine::new(),
            policy,
        }
    }

    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    pub fn epoch(&self) -> ScopeEpoch {
        self.epoch
    }

    pub fn collection(&self) -> &OrderedCollection<R> {
        &self.collection
    }

    pub fn channel(&self) -> &ChannelMachine {
        &self.channel
    }

    pub fn policy(&self) -> ReactionPolicy {
        self.policy
    }

    /// Whether work issued under `epoch` may still touch this view.
    pub fn is_current(&self, epoch: ScopeEpoch) -> bool {
        epoch == self.epoch && !self.channel.is_torn_down()
    }

    /// Replace the collection wholesale with a fetched snapshot.
    ///
    /// Returns `false` (and changes nothing) when `epoch` is stale. Rows
    /// outside the scope are dropped.
    pub fn load_snapshot(&mut self, epoch: ScopeEpoch, records: Vec<R>) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        let scope = &self.scope;
        let records = records.into_iter().filter(|r| r.belongs_to(scope)).collect();
        self.collection = OrderedCollection::from_snapshot(records);
        true
    }

    /// The subscription is being opened.
    pub fn begin_open(&mut self) -> Result<()> {
        self.channel.begin_open()
    }

    /// The transport acknowledged the subscription.
    pub fn acknowledge(&mut self) -> Result<()> {
        self.channel.acknowledge()
    }

    /// Whether `event` should be acted on.
    ///
    /// False while the channel is not yet acknowledged, for other scopes and
    /// for operations outside the reaction policy.
    pub fn wants(&self, event: &ChangeEvent) -> bool {
        self.channel.accepts_events()
            && event.is_for(&self.scope)
            && self.policy.reacts_to(event.operation)
    }

    /// Reconcile a change issued under `epoch`.
    pub fn apply(&mut self, epoch: ScopeEpoch, change: Change<R>) -> Applied {
        if !self.is_current(epoch) {
            return Applied::Stale;
        }
        if let Change::Inserted(record) | Change::Updated(record) = &change {
            if !record.belongs_to(&self.scope) {
                return Applied::OutOfScope;
            }
        }

        let (collection, outcome) = reconcile(&self.collection, change);
        self.collection = collection;
        Applied::Merged(outcome)
    }

    /// Remount the view on a new scope.
    ///
    /// The collection is emptied, the channel machine starts over and the
    /// epoch advances so that outstanding work for the old mount is stale.
    pub fn retarget(&mut self, scope: ScopeKey) -> ScopeEpoch {
        self.scope = scope;
        self.epoch = self.epoch.next();
        self.collection = OrderedCollection::new();
        self.channel = ChannelMachine::new();
        self.epoch
    }

    /// Unmount. Returns `false` if the view was already closed.
    pub fn close(&mut self) -> bool {
        let closed = self.channel.close();
        if closed {
            self.epoch = self.epoch.next();
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, Registration, Table};

    fn msg(id: &str, room: &str, created_at: i64) -> ChatMessage {
        ChatMessage::new(id, room, "ada", format!("text of {id}"), created_at)
    }

    fn live_room(room: &str) -> LiveView<ChatMessage> {
        let mut view = LiveView::new(ScopeKey::room(room), ReactionPolicy::InsertsOnly);
        view.begin_open().unwrap();
        view.acknowledge().unwrap();
        view
    }

    #[test]
    fn merge_sequence() {
        let mut view = live_room("general");
        let epoch = view.epoch();

        let applied = view.apply(epoch, Change::Inserted(msg("m1", "general", 1)));
        assert_eq!(applied, Applied::Merged(MergeOutcome::Appended));
        assert_eq!(view.collection().ids(), vec!["m1"]);

        let applied = view.apply(epoch, Change::Inserted(msg("m1", "general", 1)));
        assert_eq!(applied, Applied::Merged(MergeOutcome::Duplicate));
        assert_eq!(view.collection().ids(), vec!["m1"]);

        view.apply(epoch, Change::Inserted(msg("m2", "general", 2)));
        assert_eq!(view.collection().ids(), vec!["m1", "m2"]);
    }

    #[test]
    fn resolution_order_wins_over_creation_order() {
        let mut view = live_room("general");
        let epoch = view.epoch();
        view.load_snapshot(epoch, vec![msg("m1", "general", 1)]);

        // m2 and m3 fetched concurrently; m3 resolves first
        view.apply(epoch, Change::Inserted(msg("m3", "general", 3)));
        view.apply(epoch, Change::Inserted(msg("m2", "general", 2)));

        assert_eq!(view.collection().ids(), vec!["m1", "m3", "m2"]);
    }

    #[test]
    fn results_after_close_are_stale() {
        let mut view = live_room("general");
        let epoch = view.epoch();

        assert!(view.close());
        let applied = view.apply(epoch, Change::Inserted(msg("m2", "general", 2)));

        assert_eq!(applied, Applied::Stale);
        assert!(view.collection().is_empty());
        assert!(!view.close());
    }

    #[test]
    fn results_after_retarget_are_stale() {
        let mut view = live_room("general");
        let old = view.epoch();

        let new = view.retarget(ScopeKey::room("general"));
        assert_ne!(old, new);

        let applied = view.apply(old, Change::Inserted(msg("m2", "general", 2)));
        assert_eq!(applied, Applied::Stale);

        let applied = view.apply(new, Change::Inserted(msg("m2", "general", 2)));
        assert_eq!(applied, Applied::Merged(MergeOutcome::Appended));
    }

    #[test]
    fn other_scope_never_merged() {
        let mut view = live_room("general");
        let epoch = view.epoch();

        let applied = view.apply(epoch, Change::Inserted(msg("m1", "random", 1)));
        assert_eq!(applied, Applied::OutOfScope);
        assert!(view.collection().is_empty());

        let event = ChangeEvent::insert(Table::ChatMessages, "m1", ScopeKey::room("random"));
        assert!(!view.wants(&event));
    }

    #[test]
    fn events_before_ack_are_ignored() {
        let mut view: LiveView<ChatMessage> =
            LiveView::new(ScopeKey::room("general"), ReactionPolicy::InsertsOnly);
        let event = ChangeEvent::insert(Table::ChatMessages, "m1", ScopeKey::room("general"));

        assert!(!view.wants(&event));
        view.begin_open().unwrap();
        assert!(!view.wants(&event));
        view.acknowledge().unwrap();
        assert!(view.wants(&event));
    }

    #[test]
    fn policy_filters_operations() {
        let scope = ScopeKey::event("e1");
        let delete = ChangeEvent::delete(Table::Registrations, "r1", scope.clone());

        let mut inserts_only: LiveView<Registration> =
            LiveView::new(scope.clone(), ReactionPolicy::InsertsOnly);
        inserts_only.begin_open().unwrap();
        inserts_only.acknowledge().unwrap();
        assert!(!inserts_only.wants(&delete));

        let mut all: LiveView<Registration> = LiveView::new(scope, ReactionPolicy::AllChanges);
        all.begin_open().unwrap();
        all.acknowledge().unwrap();
        assert!(all.wants(&delete));
    }

    #[test]
    fn snapshot_replaces_and_filters() {
        let mut view = live_room("general");
        let epoch = view.epoch();
        view.apply(epoch, Change::Inserted(msg("m0", "general", 0)));

        assert!(view.load_snapshot(
            epoch,
            vec![
                msg("m2", "general", 2),
                msg("x1", "random", 1),
                msg("m1", "general", 1)
            ]
        ));
        assert_eq!(view.collection().ids(), vec!["m1", "m2"]);
    }

    #[test]
    fn stale_snapshot_ignored() {
        let mut view = live_room("general");
        let old = view.epoch();
        view.retarget(ScopeKey::room("random"));

        assert!(!view.load_snapshot(old, vec![msg("m1", "general", 1)]));
        assert!(view.collection().is_empty());
    }
}
