//! Trip event model
//!
//! Events are append-only: the timeline shown to users and, for the
//! `overdue`/`notify` kinds, the scheduler's durable idempotency marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Started,
    Checkin,
    Checkout,
    Extended,
    Overdue,
    Notify,
    Cancelled,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Started => "started",
            EventKind::Checkin => "checkin",
            EventKind::Checkout => "checkout",
            EventKind::Extended => "extended",
            EventKind::Overdue => "overdue",
            EventKind::Notify => "notify",
            EventKind::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<EventKind> {
        match s {
            "created" => Some(EventKind::Created),
            "started" => Some(EventKind::Started),
            "checkin" => Some(EventKind::Checkin),
            "checkout" => Some(EventKind::Checkout),
            "extended" => Some(EventKind::Extended),
            "overdue" => Some(EventKind::Overdue),
            "notify" => Some(EventKind::Notify),
            "cancelled" => Some(EventKind::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TripEvent {
    pub id: i64,
    pub trip_id: Uuid,
    pub kind: String,
    pub at: DateTime<Utc>,
    pub meta: Option<serde_json::Value>,
}

impl TripEvent {
    pub fn event_kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            EventKind::Created,
            EventKind::Started,
            EventKind::Checkin,
            EventKind::Checkout,
            EventKind::Extended,
            EventKind::Overdue,
            EventKind::Notify,
            EventKind::Cancelled,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("paused"), None);
    }
}
