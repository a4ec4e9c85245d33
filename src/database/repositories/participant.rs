//! Participant repository implementation

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::participant::{InviteParticipantRequest, Participant};
use crate::utils::errors::TripGuardError;

const PARTICIPANT_COLUMNS: &str = "id, trip_id, user_id, display_name, role, status, invited_by, \
     invited_at, joined_at, left_at, last_checkin_at, last_lat, last_lon";

#[derive(Debug, Clone)]
pub struct ParticipantRepository {
    pool: PgPool,
}

impl ParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the owner row at trip creation, already accepted. Runs inside
    /// the trip-creation transaction.
    pub async fn create_owner_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
        user_id: i64,
        display_name: &str,
    ) -> Result<Participant, TripGuardError> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO participants (trip_id, user_id, display_name, role, status, invited_at, joined_at)
            VALUES ($1, $2, $3, 'owner', 'accepted', $4, $4)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        );
        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .bind(user_id)
            .bind(display_name)
            .bind(now)
            .fetch_one(conn)
            .await?;

        Ok(participant)
    }

    /// Create an invited participant row
    pub async fn invite(
        &self,
        request: &InviteParticipantRequest,
    ) -> Result<Participant, TripGuardError> {
        let sql = format!(
            r#"
            INSERT INTO participants (trip_id, user_id, display_name, role, status, invited_by, invited_at)
            VALUES ($1, $2, $3, 'participant', 'invited', $4, $5)
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        );
        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(request.trip_id)
            .bind(request.user_id)
            .bind(&request.display_name)
            .bind(request.invited_by)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(participant)
    }

    /// Find a participant row by (trip, user)
    pub async fn find(
        &self,
        trip_id: Uuid,
        user_id: i64,
    ) -> Result<Option<Participant>, TripGuardError> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = $1 AND user_id = $2"
        );
        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(participant)
    }

    /// Full roster for a trip
    pub async fn list_for_trip(&self, trip_id: Uuid) -> Result<Vec<Participant>, TripGuardError> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = $1 ORDER BY invited_at ASC"
        );
        let participants = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(participants)
    }

    /// Currently-accepted participants only
    pub async fn list_accepted(&self, trip_id: Uuid) -> Result<Vec<Participant>, TripGuardError> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = $1 AND status = 'accepted' ORDER BY invited_at ASC"
        );
        let participants = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(participants)
    }

    /// Count accepted participants inside the caller's transaction.
    ///
    /// Used by the quorum tally under the trip row lock, so the count the
    /// voter sees is the count the completion decision is made against.
    pub async fn count_accepted_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
    ) -> Result<i64, TripGuardError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM participants WHERE trip_id = $1 AND status = 'accepted'",
        )
        .bind(trip_id)
        .fetch_one(conn)
        .await?;

        Ok(count.0)
    }

    /// Mark an invited participant accepted
    pub async fn mark_accepted(
        &self,
        trip_id: Uuid,
        user_id: i64,
    ) -> Result<Participant, TripGuardError> {
        let sql = format!(
            r#"
            UPDATE participants
            SET status = 'accepted', joined_at = $3
            WHERE trip_id = $1 AND user_id = $2
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        );
        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(participant)
    }

    /// Mark an invited participant declined
    pub async fn mark_declined(
        &self,
        trip_id: Uuid,
        user_id: i64,
    ) -> Result<Participant, TripGuardError> {
        let sql = format!(
            r#"
            UPDATE participants
            SET status = 'declined'
            WHERE trip_id = $1 AND user_id = $2
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        );
        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(participant)
    }

    /// Mark an accepted participant as having left
    pub async fn mark_left(
        &self,
        trip_id: Uuid,
        user_id: i64,
    ) -> Result<Participant, TripGuardError> {
        let sql = format!(
            r#"
            UPDATE participants
            SET status = 'left', left_at = $3
            WHERE trip_id = $1 AND user_id = $2
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        );
        let participant = sqlx::query_as::<_, Participant>(&sql)
            .bind(trip_id)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(participant)
    }

    /// Record a participant check-in with an optional position, inside the
    /// check-in transaction
    pub async fn record_checkin_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
        user_id: i64,
        now: DateTime<Utc>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<(), TripGuardError> {
        sqlx::query(
            r#"
            UPDATE participants
            SET last_checkin_at = $3,
                last_lat = COALESCE($4, last_lat),
                last_lon = COALESCE($5, last_lon)
            WHERE trip_id = $1 AND user_id = $2
            "#,
        )
        .bind(trip_id)
        .bind(user_id)
        .bind(now)
        .bind(lat)
        .bind(lon)
        .execute(conn)
        .await?;

        Ok(())
    }
}
