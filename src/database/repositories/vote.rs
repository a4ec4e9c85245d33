//! Checkout vote repository implementation
//!
//! The tally primitives run inside the vote-cast transaction, under the
//! trip row lock taken by `TripRepository::find_for_update`.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::vote::CheckoutVote;
use crate::utils::errors::TripGuardError;

#[derive(Debug, Clone)]
pub struct VoteRepository {
    pool: PgPool,
}

impl VoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the caller's vote if absent. Voting twice is a no-op, not an
    /// error; returns whether a new vote was actually recorded.
    pub async fn cast_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
        user_id: i64,
    ) -> Result<bool, TripGuardError> {
        let result = sqlx::query(
            r#"
            INSERT INTO checkout_votes (trip_id, user_id, cast_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (trip_id, user_id) DO NOTHING
            "#,
        )
        .bind(trip_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count votes cast by currently-accepted participants only. A vote from
    /// someone who has since left no longer counts.
    pub async fn count_valid_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
    ) -> Result<i64, TripGuardError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM checkout_votes v
            INNER JOIN participants p ON p.trip_id = v.trip_id AND p.user_id = v.user_id
            WHERE v.trip_id = $1 AND p.status = 'accepted'
            "#,
        )
        .bind(trip_id)
        .fetch_one(conn)
        .await?;

        Ok(count.0)
    }

    /// Clear all votes for a trip, inside the completing transaction
    pub async fn clear_tx(
        &self,
        conn: &mut PgConnection,
        trip_id: Uuid,
    ) -> Result<(), TripGuardError> {
        sqlx::query("DELETE FROM checkout_votes WHERE trip_id = $1")
            .bind(trip_id)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Remove a single user's vote (leave, removal, or retraction)
    pub async fn delete_for_user(
        &self,
        trip_id: Uuid,
        user_id: i64,
    ) -> Result<(), TripGuardError> {
        sqlx::query("DELETE FROM checkout_votes WHERE trip_id = $1 AND user_id = $2")
            .bind(trip_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All votes currently recorded for a trip
    pub async fn list_for_trip(&self, trip_id: Uuid) -> Result<Vec<CheckoutVote>, TripGuardError> {
        let votes = sqlx::query_as::<_, CheckoutVote>(
            "SELECT id, trip_id, user_id, cast_at FROM checkout_votes WHERE trip_id = $1 ORDER BY cast_at ASC",
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(votes)
    }
}
