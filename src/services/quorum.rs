//! Checkout quorum voter
//!
//! Concurrency-safe tally of checkout votes for group trips. The trip row
//! is locked for the duration of the vote-cast transaction so two
//! concurrent voters cannot both read a stale count and miss the
//! completion; this is the one place in the engine that needs pessimistic
//! locking.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::database::DatabaseService;
use crate::models::event::EventKind;
use crate::models::trip::{CheckoutMode, Trip};
use crate::models::vote::{votes_needed, VoteOutcome};
use crate::services::notification::NotificationService;
use crate::utils::errors::{Result, TripGuardError};

#[derive(Clone)]
pub struct QuorumService {
    db: DatabaseService,
    notifications: NotificationService,
}

impl QuorumService {
    pub fn new(db: DatabaseService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Cast a checkout vote, or complete the trip outright depending on the
    /// checkout mode. Voting twice, or voting on an already-completed trip,
    /// is idempotent success without repeated side effects.
    pub async fn complete_or_vote(&self, trip_id: Uuid, user_id: i64) -> Result<VoteOutcome> {
        // Authorization reads happen before the lock; the counts that decide
        // completion are all taken under it.
        let caller = self
            .db
            .participants
            .find(trip_id, user_id)
            .await?
            .ok_or(TripGuardError::ParticipantNotFound { trip_id, user_id })?;

        let mut tx = self.db.begin().await?;
        let trip = self
            .db
            .trips
            .find_for_update(&mut tx, trip_id)
            .await?
            .ok_or(TripGuardError::TripNotFound { trip_id })?;

        let status = trip.lifecycle_status();
        if status == crate::models::trip::TripStatus::Completed {
            // Votes were cleared when the trip completed; nothing to re-fire.
            tx.commit().await?;
            return Ok(VoteOutcome {
                votes_cast: 0,
                votes_needed: 0,
                completed: true,
            });
        }
        if !status.is_underway() {
            tx.rollback().await?;
            return Err(TripGuardError::state_conflict(
                status,
                "checkout",
                "trip is not underway",
            ));
        }
        if !caller.is_accepted() {
            tx.rollback().await?;
            return Err(TripGuardError::PermissionDenied(
                "Only accepted participants can check out or vote".to_string(),
            ));
        }

        let mode = if trip.is_group_trip {
            trip.group_checkout_mode()
        } else {
            CheckoutMode::Anyone
        };

        match mode {
            CheckoutMode::Anyone => {
                self.complete_in_tx(&mut tx, &trip, user_id).await?;
                tx.commit().await?;
                self.after_completion(&trip).await;
                Ok(VoteOutcome {
                    votes_cast: 1,
                    votes_needed: 1,
                    completed: true,
                })
            }
            CheckoutMode::OwnerOnly => {
                if trip.owner_id != user_id {
                    tx.rollback().await?;
                    return Err(TripGuardError::PermissionDenied(
                        "Only the trip owner can check out this trip".to_string(),
                    ));
                }
                self.complete_in_tx(&mut tx, &trip, user_id).await?;
                tx.commit().await?;
                self.after_completion(&trip).await;
                Ok(VoteOutcome {
                    votes_cast: 1,
                    votes_needed: 1,
                    completed: true,
                })
            }
            CheckoutMode::Vote => {
                self.db.votes.cast_tx(&mut tx, trip_id, user_id).await?;

                let accepted = self.db.participants.count_accepted_tx(&mut tx, trip_id).await?;
                let needed = votes_needed(accepted, trip.vote_threshold);
                let cast = self.db.votes.count_valid_tx(&mut tx, trip_id).await?;

                if cast >= needed {
                    self.complete_in_tx(&mut tx, &trip, user_id).await?;
                    tx.commit().await?;
                    self.after_completion(&trip).await;
                    Ok(VoteOutcome {
                        votes_cast: cast,
                        votes_needed: needed,
                        completed: true,
                    })
                } else {
                    tx.commit().await?;
                    let outcome = VoteOutcome {
                        votes_cast: cast,
                        votes_needed: needed,
                        completed: false,
                    };
                    if let Err(e) = self
                        .notifications
                        .notify_vote_progress(&trip, user_id, &caller.display_name, &outcome)
                        .await
                    {
                        tracing::warn!(trip_id = %trip_id, error = %e, "Vote-progress fan-out failed");
                    }
                    info!(
                        trip_id = %trip_id,
                        user_id = user_id,
                        votes_cast = cast,
                        votes_needed = needed,
                        "Checkout vote recorded"
                    );
                    Ok(outcome)
                }
            }
        }
    }

    /// Retract a previously cast vote. Removing an absent vote is a no-op.
    pub async fn retract_vote(&self, trip_id: Uuid, user_id: i64) -> Result<()> {
        let trip = self
            .db
            .trips
            .find_by_id(trip_id)
            .await?
            .ok_or(TripGuardError::TripNotFound { trip_id })?;
        if trip.lifecycle_status().is_terminal() {
            return Err(TripGuardError::state_conflict(
                trip.lifecycle_status(),
                "retract_vote",
                "trip already ended",
            ));
        }

        self.db.votes.delete_for_user(trip_id, user_id).await?;
        crate::utils::logging::log_trip_action(trip_id, user_id, "retract_vote", None);
        Ok(())
    }

    async fn complete_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        trip: &Trip,
        user_id: i64,
    ) -> Result<()> {
        let now = Utc::now();
        self.db.trips.complete_tx(tx, trip.id, now).await?;
        self.db.votes.clear_tx(tx, trip.id).await?;
        self.db
            .events
            .record_tx(
                tx,
                trip.id,
                EventKind::Checkout,
                Some(serde_json::json!({ "user_id": user_id })),
            )
            .await?;

        crate::utils::logging::log_transition(
            trip.id,
            trip.status.as_str(),
            "completed",
            "checkout",
        );
        Ok(())
    }

    /// Fire-and-forget "safe" fan-out, only after the completing
    /// transaction has committed.
    async fn after_completion(&self, trip: &Trip) {
        if let Err(e) = self.notifications.notify_trip_safe(trip).await {
            tracing::warn!(trip_id = %trip.id, error = %e, "Safe-checkout fan-out failed");
        }
    }
}
