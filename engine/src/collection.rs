//! The client-held ordered collection for one scope.
//!
//! Collections are persistent: every change produces a new handle and the
//! previous handle keeps seeing the old contents. Cloning is cheap.

use crate::{LiveRecord, RecordId};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered, id-unique list of records.
///
/// Invariant: no two elements share an id.
#[derive(Debug)]
pub struct OrderedCollection<R> {
    items: Arc<Vec<R>>,
    /// Position of every record by id
    index: Arc<HashMap<RecordId, usize>>,
    /// Number of changes applied since the snapshot
    revision: u64,
}

impl<R> Clone for OrderedCollection<R> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            index: Arc::clone(&self.index),
            revision: self.revision,
        }
    }
}

impl<R> Default for OrderedCollection<R> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            index: Arc::new(HashMap::new()),
            revision: 0,
        }
    }
}

impl<R: PartialEq> PartialEq for OrderedCollection<R> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<R: LiveRecord> OrderedCollection<R> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from a fetched snapshot.
    ///
    /// Records are sorted by `created_at` ascending, ties broken by id. If
    /// the same id appears more than once the first occurrence wins.
    pub fn from_snapshot(mut records: Vec<R>) -> Self {
        records.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });

        let mut index = HashMap::with_capacity(records.len());
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            if index.contains_key(record.id()) {
                continue;
            }
            index.insert(record.id().clone(), items.len());
            items.push(record);
        }

        Self {
            items: Arc::new(items),
            index: Arc::new(index),
            revision: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[R] {
        &self.items
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<&R> {
        self.position(id).map(|pos| &self.items[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Position of the record with `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Ids in collection order.
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|r| r.id().as_str()).collect()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether both handles share the same storage, i.e. nothing changed
    /// between them.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    /// Whether records are in non-decreasing `created_at` order.
    pub fn is_chronological(&self) -> bool {
        self.items
            .windows(2)
            .all(|pair| pair[0].created_at() <= pair[1].created_at())
    }

    pub(crate) fn appended(&self, record: R) -> Self {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.extend(self.items.iter().cloned());

        let mut index = (*self.index).clone();
        index.insert(record.id().clone(), items.len());
        items.push(record);

        self.successor(items, index)
    }

    pub(crate) fn replaced(&self, pos: usize, record: R) -> Self {
        let mut items = (*self.items).clone();
        items[pos] = record;
        self.successor(items, (*self.index).clone())
    }

    pub(crate) fn removed(&self, pos: usize) -> Self {
        let mut items = (*self.items).clone();
        items.remove(pos);
        let index = items
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id().clone(), i))
            .collect();
        self.successor(items, index)
    }

    fn successor(&self, items: Vec<R>, index: HashMap<RecordId, usize>) -> Self {
        Self {
            items: Arc::new(items),
            index: Arc::new(index),
            revision: self.revision + 1,
        }
    }
}

impl<'a, R> IntoIterator for &'a OrderedCollection<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
