//! Trip repository implementation
//!
//! All trip-row SQL lives here, including the scheduler's scan queries and
//! the guard-column updates. Status strings written here always come from
//! `TripStatus`, never from callers.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::trip::{CreateTripRequest, GroupSettings, ReminderKind, Trip, TripStatus};
use crate::utils::errors::TripGuardError;

const TRIP_COLUMNS: &str = "id, owner_id, activity, details, start_at, eta_at, grace_minutes, \
     status, completed_at, starting_soon_sent, started_sent, approaching_eta_sent, \
     eta_reached_sent, checkin_reminder_sent_at, grace_warning_sent_at, is_group_trip, \
     checkout_mode, vote_threshold, allow_participant_invites, share_locations, \
     last_checkin_at, last_lat, last_lon, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct TripRepository {
    pool: PgPool,
}

impl TripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new trip inside the caller's transaction. `initial_status`
    /// is `active` when the start time has already passed, `planned`
    /// otherwise.
    pub async fn create_tx(
        &self,
        conn: &mut PgConnection,
        request: &CreateTripRequest,
        initial_status: TripStatus,
    ) -> Result<Trip, TripGuardError> {
        let settings = request.group_settings.clone().unwrap_or_default();
        let GroupSettings {
            checkout_mode,
            vote_threshold,
            allow_participant_invites,
            share_locations,
        } = settings;

        let sql = format!(
            r#"
            INSERT INTO trips (id, owner_id, activity, details, start_at, eta_at, grace_minutes,
                               status, is_group_trip, checkout_mode, vote_threshold,
                               allow_participant_invites, share_locations, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING {TRIP_COLUMNS}
            "#
        );

        let trip = sqlx::query_as::<_, Trip>(&sql)
            .bind(Uuid::new_v4())
            .bind(request.owner_id)
            .bind(&request.activity)
            .bind(&request.details)
            .bind(request.start_at)
            .bind(request.eta_at)
            .bind(request.grace_minutes)
            .bind(initial_status.as_str())
            .bind(request.is_group_trip)
            .bind(checkout_mode.as_str())
            .bind(vote_threshold)
            .bind(allow_participant_invites)
            .bind(share_locations)
            .bind(Utc::now())
            .fetch_one(conn)
            .await?;

        Ok(trip)
    }

    /// Find trip by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Trip>, TripGuardError> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1");
        let trip = sqlx::query_as::<_, Trip>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(trip)
    }

    /// Lock the trip row for the duration of the surrounding transaction.
    ///
    /// The quorum voter must read-then-conditionally-write the tally without
    /// a second concurrent voter observing a stale count.
    pub async fn find_for_update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Trip>, TripGuardError> {
        let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1 FOR UPDATE");
        let trip = sqlx::query_as::<_, Trip>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        Ok(trip)
    }

    /// Planned trips whose start time has arrived
    pub async fn list_due_to_start(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Trip>, TripGuardError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE status = 'planned' AND start_at <= $1 ORDER BY start_at ASC"
        );
        let trips = sqlx::query_as::<_, Trip>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(trips)
    }

    /// Active or overdue trips whose ETA has passed — the escalation set
    pub async fn list_past_eta(&self, now: DateTime<Utc>) -> Result<Vec<Trip>, TripGuardError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE status IN ('active', 'overdue') AND eta_at < $1 ORDER BY eta_at ASC"
        );
        let trips = sqlx::query_as::<_, Trip>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(trips)
    }

    /// Every non-terminal trip, for the reminder sweep
    pub async fn list_unfinished(&self) -> Result<Vec<Trip>, TripGuardError> {
        let sql = format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE status NOT IN ('completed', 'cancelled') ORDER BY start_at ASC"
        );
        let trips = sqlx::query_as::<_, Trip>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(trips)
    }

    /// Promote a planned trip to active
    pub async fn promote_to_active(&self, id: Uuid) -> Result<(), TripGuardError> {
        sqlx::query(
            "UPDATE trips SET status = 'active', updated_at = $2 WHERE id = $1 AND status = 'planned'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark an active trip overdue
    pub async fn mark_overdue(&self, id: Uuid) -> Result<(), TripGuardError> {
        sqlx::query(
            "UPDATE trips SET status = 'overdue', updated_at = $2 WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark an overdue trip as escalated to contacts
    pub async fn mark_overdue_notified(&self, id: Uuid) -> Result<(), TripGuardError> {
        sqlx::query(
            "UPDATE trips SET status = 'overdue_notified', updated_at = $2 WHERE id = $1 AND status = 'overdue'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return an underway trip to `active` and re-arm the escalation guards.
    ///
    /// Called on check-in and extend: the lead/overdue reminder flags and the
    /// grace-warning timestamp are cleared so a later overdue episode can
    /// notify again; the check-in reminder cadence restarts from now.
    ///
    /// The status guard means a trip that completed or was cancelled in the
    /// meantime is never dragged back to `active`; returns whether a row
    /// was actually updated.
    pub async fn reactivate_tx(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, TripGuardError> {
        let result = sqlx::query(
            r#"
            UPDATE trips
            SET status = 'active',
                approaching_eta_sent = FALSE,
                eta_reached_sent = FALSE,
                grace_warning_sent_at = NULL,
                checkin_reminder_sent_at = $2,
                updated_at = $2
            WHERE id = $1
              AND status IN ('active', 'overdue', 'overdue_notified')
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the trip-level check-in annotation (last seen time/position)
    pub async fn record_checkin_tx(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<(), TripGuardError> {
        sqlx::query(
            r#"
            UPDATE trips
            SET last_checkin_at = $2,
                last_lat = COALESCE($3, last_lat),
                last_lon = COALESCE($4, last_lon),
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(lat)
        .bind(lon)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Set a new ETA after an extension
    pub async fn set_eta_tx(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        eta_at: DateTime<Utc>,
    ) -> Result<(), TripGuardError> {
        sqlx::query("UPDATE trips SET eta_at = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(eta_at)
            .bind(Utc::now())
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Cancel a trip (terminal)
    pub async fn cancel_tx(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), TripGuardError> {
        sqlx::query(
            "UPDATE trips SET status = 'cancelled', completed_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Complete a trip inside the caller's transaction (terminal)
    pub async fn complete_tx(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), TripGuardError> {
        sqlx::query(
            "UPDATE trips SET status = 'completed', completed_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Persist a reminder guard so the trigger never re-fires
    pub async fn mark_reminder_sent(
        &self,
        id: Uuid,
        kind: ReminderKind,
        now: DateTime<Utc>,
    ) -> Result<(), TripGuardError> {
        let sql = match kind {
            ReminderKind::StartingSoon => {
                "UPDATE trips SET starting_soon_sent = TRUE, updated_at = $2 WHERE id = $1"
            }
            ReminderKind::Started => {
                "UPDATE trips SET started_sent = TRUE, updated_at = $2 WHERE id = $1"
            }
            ReminderKind::ApproachingEta => {
                "UPDATE trips SET approaching_eta_sent = TRUE, updated_at = $2 WHERE id = $1"
            }
            ReminderKind::EtaReached => {
                "UPDATE trips SET eta_reached_sent = TRUE, updated_at = $2 WHERE id = $1"
            }
            ReminderKind::CheckinReminder => {
                "UPDATE trips SET checkin_reminder_sent_at = $2, updated_at = $2 WHERE id = $1"
            }
            ReminderKind::GraceWarning => {
                "UPDATE trips SET grace_warning_sent_at = $2, updated_at = $2 WHERE id = $1"
            }
        };

        sqlx::query(sql)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Trips a user owns or participates in that are not yet finished
    pub async fn list_unfinished_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<Trip>, TripGuardError> {
        let sql = format!(
            r#"
            SELECT DISTINCT t.id, t.owner_id, t.activity, t.details, t.start_at, t.eta_at,
                   t.grace_minutes, t.status, t.completed_at, t.starting_soon_sent,
                   t.started_sent, t.approaching_eta_sent, t.eta_reached_sent,
                   t.checkin_reminder_sent_at, t.grace_warning_sent_at, t.is_group_trip,
                   t.checkout_mode, t.vote_threshold, t.allow_participant_invites,
                   t.share_locations, t.last_checkin_at, t.last_lat, t.last_lon,
                   t.created_at, t.updated_at
            FROM trips t
            LEFT JOIN participants p ON p.trip_id = t.id
            WHERE t.status NOT IN ('completed', 'cancelled')
              AND (t.owner_id = $1 OR (p.user_id = $1 AND p.status = 'accepted'))
            ORDER BY t.start_at ASC
            "#
        );
        let trips = sqlx::query_as::<_, Trip>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(trips)
    }
}
