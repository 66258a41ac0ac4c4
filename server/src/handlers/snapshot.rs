//! Snapshot and single-record reads.
//!
//! Both return rows in their wire form, profile fields joined in.

use club_engine::{ScopeKey, Table};
use serde::Serialize;
use serde_json::Value;

use crate::db::{self, Pool};
use crate::error::{AppError, Result};

/// Load the rows of a scope's collection, oldest first.
pub async fn handle_snapshot(pool: &Pool, scope: &ScopeKey, limit: i64) -> Result<Vec<Value>> {
    scope.validate()?;

    let rows = match scope {
        ScopeKey::Room { room_id } => {
            to_values(db::messages::list_for_room(pool, room_id, limit).await?)?
        }
        ScopeKey::Month { .. } => {
            let (start, end) = scope
                .month_bounds()
                .ok_or_else(|| AppError::BadRequest(format!("invalid month {scope}")))?;
            to_values(db::events::list_starting_between(pool, start, end, limit).await?)?
        }
        ScopeKey::Event { event_id } => {
            to_values(db::registrations::list_for_event(pool, event_id, limit).await?)?
        }
    };

    tracing::debug!(scope = %scope, rows = rows.len(), "Served snapshot");
    Ok(rows)
}

/// Fetch one row of `table` by id. `None` when it does not exist.
pub async fn handle_fetch_record(pool: &Pool, table: Table, id: &str) -> Result<Option<Value>> {
    let value = match table {
        Table::ChatMessages => db::messages::get(pool, id).await?.map(to_value).transpose()?,
        Table::Events => db::events::get(pool, id).await?.map(to_value).transpose()?,
        Table::Registrations => db::registrations::get(pool, id)
            .await?
            .map(to_value)
            .transpose()?,
    };
    Ok(value)
}

fn to_value<T: Serialize>(record: T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| AppError::Internal(format!("encode record: {e}")))
}

fn to_values<T: Serialize>(records: Vec<T>) -> Result<Vec<Value>> {
    records.into_iter().map(to_value).collect()
}
