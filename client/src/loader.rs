//! Snapshot loading.

use crate::error::{ClientError, Result};
use crate::gateway::RemoteGateway;
use club_engine::{decode_rows, LiveRecord, OrderedCollection, ScopeKey};
use std::sync::Arc;

/// Fetches the initial collection for a scope.
#[derive(Clone)]
pub struct SnapshotLoader {
    gateway: Arc<dyn RemoteGateway>,
}

impl SnapshotLoader {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { gateway }
    }

    /// Load the collection for `scope`, ordered by creation time.
    ///
    /// An invalid scope yields an empty collection without touching the
    /// gateway. Transport failures and malformed rows are errors; nothing is
    /// retried.
    pub async fn load<R: LiveRecord>(&self, scope: &ScopeKey) -> Result<OrderedCollection<R>> {
        let records = self.fetch_records(scope).await?;
        Ok(OrderedCollection::from_snapshot(records))
    }

    /// Fetch and decode the rows for `scope` without ordering them.
    ///
    /// Rows that do not belong to `scope` are dropped.
    pub async fn fetch_records<R: LiveRecord>(&self, scope: &ScopeKey) -> Result<Vec<R>> {
        if scope.table() != R::TABLE {
            return Err(club_engine::Error::ScopeMismatch {
                scope: scope.to_string(),
                table: R::TABLE,
            }
            .into());
        }

        if let Err(err) = scope.validate() {
            tracing::debug!(scope = %scope, error = %err, "Skipping snapshot for invalid scope");
            return Ok(Vec::new());
        }

        let rows = self
            .gateway
            .fetch_collection(scope)
            .await
            .map_err(|e| ClientError::LoadFailed {
                scope: scope.clone(),
                reason: e.to_string(),
            })?;

        let fetched = rows.len();
        let records: Vec<R> = decode_rows::<R>(rows)?
            .into_iter()
            .filter(|r| r.belongs_to(scope))
            .collect();

        if records.len() != fetched {
            tracing::warn!(
                scope = %scope,
                dropped = fetched - records.len(),
                "Snapshot contained rows outside the scope"
            );
        }
        tracing::debug!(scope = %scope, count = records.len(), "Snapshot loaded");

        Ok(records)
    }
}
