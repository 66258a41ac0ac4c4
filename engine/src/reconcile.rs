//! Reconciliation of incoming records into an ordered collection.
//!
//! # Rules
//!
//! 1. An insert whose id is already present is a no-op. The same collection
//!    handle is returned, so replaying an insert any number of times yields
//!    the same result as applying it once.
//! 2. Any other insert is appended at the end. The collection is not
//!    re-sorted: records show up in the order they arrive, which matches
//!    creation order only when the transport delivers in creation order.
//! 3. The input collection is never mutated. A change always produces a new
//!    handle so that observers can detect it by identity.

use crate::{LiveRecord, OrderedCollection, RecordId};
use serde::{Deserialize, Serialize};

/// A change to apply to a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<R> {
    /// A newly created record
    Inserted(R),
    /// A fresh copy of an existing record
    Updated(R),
    /// A record that no longer exists
    Deleted(RecordId),
}

impl<R: LiveRecord> Change<R> {
    pub fn record_id(&self) -> &RecordId {
        match self {
            Change::Inserted(r) | Change::Updated(r) => r.id(),
            Change::Deleted(id) => id,
        }
    }
}

/// What a reconciliation step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeOutcome {
    /// Record appended at the end
    Appended,
    /// Insert for an id that is already present; nothing changed
    Duplicate,
    /// Existing record replaced in place
    Replaced,
    /// Record removed
    Removed,
    /// Update or delete for an id that is not present; nothing changed
    Missing,
}

impl MergeOutcome {
    /// Whether the collection changed.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            MergeOutcome::Appended | MergeOutcome::Replaced | MergeOutcome::Removed
        )
    }
}

/// Merge an inserted record into `collection`.
///
/// Returns the same collection handle when `incoming.id` is already present,
/// otherwise a new collection with `incoming` appended.
pub fn merge<R: LiveRecord>(
    collection: &OrderedCollection<R>,
    incoming: R,
) -> OrderedCollection<R> {
    reconcile(collection, Change::Inserted(incoming)).0
}

/// Apply any [`Change`] to `collection`.
pub fn reconcile<R: LiveRecord>(
    collection: &OrderedCollection<R>,
    change: Change<R>,
) -> (OrderedCollection<R>, MergeOutcome) {
    match change {
        Change::Inserted(record) => {
            if collection.contains(record.id()) {
                (collection.clone(), MergeOutcome::Duplicate)
            } else {
                (collection.appended(record), MergeOutcome::Appended)
            }
        }
        Change::Updated(record) => match collection.position(record.id()) {
            Some(pos) => (collection.replaced(pos, record), MergeOutcome::Replaced),
            None => (collection.clone(), MergeOutcome::Missing),
        },
        Change::Deleted(id) => match collection.position(&id) {
            Some(pos) => (collection.removed(pos), MergeOutcome::Removed),
            None => (collection.clone(), MergeOutcome::Missing),
        },
    }
}
