//! Trip event repository implementation
//!
//! The event log is append-only. Besides serving the user-facing timeline,
//! the existence of an `overdue` or `notify` event is the scheduler's
//! durable idempotency marker, so `exists` is the authoritative guard check.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::event::{EventKind, TripEvent};
use crate::utils::errors::TripGuardError;

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an event
    pub async fn record(
        &self,
        trip_id: Uuid,
        kind: EventKind,
        meta: Option<serde_json::Value>,
    ) -> Result<TripEvent, TripGuardError> {
        let event = sqlx::query_as::<_, TripEvent>(
            r#"
            INSERT INTO trip_events (trip_id, kind, at, meta)
            VALUES ($1, $2, NOW(), $3)
            RETURNING id, trip_id, kind, at, meta
            "#,
        )
        .bind(trip_id)
        .bind(kind.as_str())
        .bind(meta)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Append an event inside the caller's transaction
    pub async fn record_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
        kind: EventKind,
        meta: Option<serde_json::Value>,
    ) -> Result<TripEvent, TripGuardError> {
        let event = sqlx::query_as::<_, TripEvent>(
            r#"
            INSERT INTO trip_events (trip_id, kind, at, meta)
            VALUES ($1, $2, NOW(), $3)
            RETURNING id, trip_id, kind, at, meta
            "#,
        )
        .bind(trip_id)
        .bind(kind.as_str())
        .bind(meta)
        .fetch_one(conn)
        .await?;

        Ok(event)
    }

    /// Whether an event of this kind has ever been recorded for the trip
    pub async fn exists(&self, trip_id: Uuid, kind: EventKind) -> Result<bool, TripGuardError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM trip_events WHERE trip_id = $1 AND kind = $2",
        )
        .bind(trip_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    /// Whether an event of this kind has been recorded in the current
    /// overdue episode, i.e. since the trip last returned to `active` via a
    /// check-in or extension.
    ///
    /// A plain existence check would permanently disarm escalation after
    /// the first overdue episode; scoping to the episode lets a check-in
    /// re-arm the `overdue`/`notify` guards while keeping them durable.
    pub async fn exists_in_current_episode(
        &self,
        trip_id: Uuid,
        kind: EventKind,
    ) -> Result<bool, TripGuardError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM trip_events
            WHERE trip_id = $1
              AND kind = $2
              AND at >= COALESCE(
                  (SELECT MAX(at) FROM trip_events
                   WHERE trip_id = $1 AND kind IN ('checkin', 'extended')),
                  '-infinity'::timestamptz
              )
            "#,
        )
        .bind(trip_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0 > 0)
    }

    /// Ordered timeline for a trip
    pub async fn list_for_trip(&self, trip_id: Uuid) -> Result<Vec<TripEvent>, TripGuardError> {
        let events = sqlx::query_as::<_, TripEvent>(
            "SELECT id, trip_id, kind, at, meta FROM trip_events WHERE trip_id = $1 ORDER BY at ASC, id ASC",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
