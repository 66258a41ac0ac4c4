//! Scope keys partition live collections.
//!
//! A scope is immutable for the lifetime of one subscription. Changing the
//! scope of a live list tears the subscription down and opens a new one.

use crate::{error::Result, Error, EventId, RoomId, Table, Timestamp};
use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIN_YEAR: i32 = 1970;
const MAX_YEAR: i32 = 9999;

/// Identifies which live collection a subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ScopeKey {
    /// Messages of one chat room
    Room { room_id: RoomId },
    /// Events starting within one calendar month (UTC)
    Month { year: i32, month: u32 },
    /// Registrations for one event
    Event { event_id: EventId },
}

impl ScopeKey {
    pub fn room(room_id: impl Into<RoomId>) -> Self {
        ScopeKey::Room {
            room_id: room_id.into(),
        }
    }

    pub fn month(year: i32, month: u32) -> Self {
        ScopeKey::Month { year, month }
    }

    pub fn event(event_id: impl Into<EventId>) -> Self {
        ScopeKey::Event {
            event_id: event_id.into(),
        }
    }

    /// The calendar month containing `timestamp`.
    pub fn month_containing(timestamp: Timestamp) -> Option<Self> {
        let at = DateTime::from_timestamp_millis(timestamp)?;
        Some(ScopeKey::month(at.year(), at.month()))
    }

    /// The table whose rows make up this collection.
    pub fn table(&self) -> Table {
        match self {
            ScopeKey::Room { .. } => Table::ChatMessages,
            ScopeKey::Month { .. } => Table::Events,
            ScopeKey::Event { .. } => Table::Registrations,
        }
    }

    /// Check that the key can address a collection.
    pub fn validate(&self) -> Result<()> {
        match self {
            ScopeKey::Room { room_id } if room_id.trim().is_empty() => {
                Err(Error::InvalidScope("room id is empty".into()))
            }
            ScopeKey::Event { event_id } if event_id.trim().is_empty() => {
                Err(Error::InvalidScope("event id is empty".into()))
            }
            ScopeKey::Month { year, month } => {
                if !(1..=12).contains(month) {
                    return Err(Error::InvalidScope(format!("month {month} out of range")));
                }
                if !(MIN_YEAR..=MAX_YEAR).contains(year) {
                    return Err(Error::InvalidScope(format!("year {year} out of range")));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Half-open `[start, end)` millisecond range of a month scope.
    ///
    /// Returns `None` for other scopes and for invalid months.
    pub fn month_bounds(&self) -> Option<(Timestamp, Timestamp)> {
        let &ScopeKey::Month { year, month } = self else {
            return None;
        };
        if !self.is_valid() {
            return None;
        }
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        Some((
            first_instant(year, month)?,
            first_instant(next_year, next_month)?,
        ))
    }
}

fn first_instant(year: i32, month: u32) -> Option<Timestamp> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKey::Room { room_id } => write!(f, "room:{room_id}"),
            ScopeKey::Month { year, month } => write!(f, "month:{year:04}-{month:02}"),
            ScopeKey::Event { event_id } => write!(f, "event:{event_id}"),
        }
    }
}

impl FromStr for ScopeKey {
    type Err = Error;

    /// Parse `room:<id>`, `month:YYYY-MM` or `event:<id>`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidScope(format!("expected <kind>:<value>, got '{s}'")))?;

        let scope = match kind {
            "room" => ScopeKey::room(rest),
            "event" => ScopeKey::event(rest),
            "month" => {
                let (year, month) = rest
                    .split_once('-')
                    .ok_or_else(|| Error::InvalidScope(format!("expected YYYY-MM, got '{rest}'")))?;
                let year = year
                    .parse()
                    .map_err(|_| Error::InvalidScope(format!("invalid year '{year}'")))?;
                let month = month
                    .parse()
                    .map_err(|_| Error::InvalidScope(format!("invalid month '{month}'")))?;
                ScopeKey::month(year, month)
            }
            other => return Err(Error::InvalidScope(format!("unknown scope kind '{other}'"))),
        };

        scope.validate()?;
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_tables() {
        assert_eq!(ScopeKey::room("general").table(), Table::ChatMessages);
        assert_eq!(ScopeKey::month(2026, 10).table(), Table::Events);
        assert_eq!(ScopeKey::event("e1").table(), Table::Registrations);
    }

    #[test]
    fn empty_ids_are_invalid() {
        assert!(!ScopeKey::room("").is_valid());
        assert!(!ScopeKey::room("   ").is_valid());
        assert!(!ScopeKey::event("").is_valid());
        assert!(ScopeKey::room("general").is_valid());
    }

    #[test]
    fn month_range_checked() {
        assert!(!ScopeKey::month(2026, 0).is_valid());
        assert!(!ScopeKey::month(2026, 13).is_valid());
        assert!(!ScopeKey::month(1969, 5).is_valid());
        assert!(ScopeKey::month(2026, 12).is_valid());
    }

    #[test]
    fn month_bounds_are_half_open() {
        let (start, end) = ScopeKey::month(2026, 10).month_bounds().unwrap();
        assert_eq!(start, 1_790_812_800_000);
        assert_eq!(end, 1_793_491_200_000);

        let (start, end) = ScopeKey::month(2026, 12).month_bounds().unwrap();
        assert_eq!(start, 1_796_083_200_000);
        assert_eq!(end, 1_798_761_600_000);

        assert!(ScopeKey::room("general").month_bounds().is_none());
        assert!(ScopeKey::month(2026, 13).month_bounds().is_none());
    }

    #[test]
    fn month_containing_timestamp() {
        assert_eq!(
            ScopeKey::month_containing(1_793_487_600_000),
            Some(ScopeKey::month(2026, 10))
        );
        assert_eq!(
            ScopeKey::month_containing(1_793_491_200_000),
            Some(ScopeKey::month(2026, 11))
        );
    }

    #[test]
    fn display_and_parse() {
        for scope in [
            ScopeKey::room("general"),
            ScopeKey::month(2026, 3),
            ScopeKey::event("e-42"),
        ] {
            let text = scope.to_string();
            assert_eq!(text.parse::<ScopeKey>().unwrap(), scope);
        }
        assert_eq!(ScopeKey::month(2026, 3).to_string(), "month:2026-03");
        assert!("room:".parse::<ScopeKey>().is_err());
        assert!("month:2026".parse::<ScopeKey>().is_err());
        assert!("forum:x".parse::<ScopeKey>().is_err());
        assert!("general".parse::<ScopeKey>().is_err());
    }

    #[test]
    fn serialization_format() {
        let value = serde_json::to_value(ScopeKey::room("general")).unwrap();
        assert_eq!(value, json!({"kind": "room", "roomId": "general"}));

        let value = serde_json::to_value(ScopeKey::month(2026, 10)).unwrap();
        assert_eq!(value, json!({"kind": "month", "year": 2026, "month": 10}));

        let parsed: ScopeKey =
            serde_json::from_value(json!({"kind": "event", "eventId": "e1"})).unwrap();
        assert_eq!(parsed, ScopeKey::event("e1"));
    }
}
