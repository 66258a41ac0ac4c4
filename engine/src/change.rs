//! Change events pushed by the realtime transport.
//!
//! A change event only says *that* a row changed. The record itself is
//! fetched afterwards so that display fields can be joined in.

use crate::{RecordId, ScopeKey, Table};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeOp::Insert => f.write_str("insert"),
            ChangeOp::Update => f.write_str("update"),
            ChangeOp::Delete => f.write_str("delete"),
        }
    }
}

/// A server-pushed notification that a row changed.
///
/// Not persisted; consumed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub operation: ChangeOp,
    pub table: Table,
    pub record_id: RecordId,
    /// Scope the changed row belongs to
    pub scope: ScopeKey,
}

impl ChangeEvent {
    pub fn new(
        operation: ChangeOp,
        table: Table,
        record_id: impl Into<RecordId>,
        scope: ScopeKey,
    ) -> Self {
        Self {
            operation,
            table,
            record_id: record_id.into(),
            scope,
        }
    }

    pub fn insert(table: Table, record_id: impl Into<RecordId>, scope: ScopeKey) -> Self {
        Self::new(ChangeOp::Insert, table, record_id, scope)
    }

    pub fn update(table: Table, record_id: impl Into<RecordId>, scope: ScopeKey) -> Self {
        Self::new(ChangeOp::Update, table, record_id, scope)
    }

    pub fn delete(table: Table, record_id: impl Into<RecordId>, scope: ScopeKey) -> Self {
        Self::new(ChangeOp::Delete, table, record_id, scope)
    }

    /// Whether this event concerns the collection named by `scope`.
    pub fn is_for(&self, scope: &ScopeKey) -> bool {
        self.scope == *scope && self.table == scope.table()
    }
}
