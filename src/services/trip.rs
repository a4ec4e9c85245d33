//! Trip lifecycle service
//!
//! User-action transitions: create, check-in, extend, cancel, and the
//! participant roster operations. Time-based transitions belong to the
//! scheduler; both converge on the same repositories and the same
//! notification fan-out.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::database::DatabaseService;
use crate::models::event::EventKind;
use crate::models::participant::{InviteParticipantRequest, Participant, ParticipantStatus};
use crate::models::trip::{
    extended_eta, CreateTripRequest, Trip, TripStatus, MAX_EXTENSION_MINUTES,
};
use crate::models::TripEvent;
use crate::services::notification::NotificationService;
use crate::utils::errors::{Result, TripGuardError};

#[derive(Clone)]
pub struct TripService {
    db: DatabaseService,
    notifications: NotificationService,
}

impl TripService {
    pub fn new(db: DatabaseService, notifications: NotificationService) -> Self {
        Self { db, notifications }
    }

    /// Create a trip. The owner participant row is created immediately and
    /// already accepted, for group and solo trips alike; fan-out reads the
    /// roster uniformly. One transaction covers the trip row, the owner row
    /// and the `created` event.
    pub async fn create_trip(&self, request: &CreateTripRequest) -> Result<Trip> {
        request.validate().map_err(TripGuardError::Validation)?;

        let now = Utc::now();
        let initial_status = if request.start_at <= now {
            TripStatus::Active
        } else {
            TripStatus::Planned
        };

        let mut tx = self.db.begin().await?;
        let trip = self.db.trips.create_tx(&mut tx, request, initial_status).await?;
        self.db
            .participants
            .create_owner_tx(&mut tx, trip.id, request.owner_id, &request.owner_display_name)
            .await?;
        self.db
            .events
            .record_tx(
                &mut tx,
                trip.id,
                EventKind::Created,
                Some(serde_json::json!({ "activity": trip.activity })),
            )
            .await?;
        tx.commit().await?;

        info!(
            trip_id = %trip.id,
            owner_id = request.owner_id,
            status = %initial_status,
            is_group = request.is_group_trip,
            "Trip created"
        );
        Ok(trip)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> Result<Trip> {
        self.db
            .trips
            .find_by_id(trip_id)
            .await?
            .ok_or(TripGuardError::TripNotFound { trip_id })
    }

    /// Trips a user owns or participates in that are not yet finished
    pub async fn list_unfinished_for_user(&self, user_id: i64) -> Result<Vec<Trip>> {
        self.db.trips.list_unfinished_for_user(user_id).await
    }

    /// Check in: proof of life. Returns the trip to `active` from any
    /// underway status and re-arms the escalation guards.
    ///
    /// The status check and every write run in one transaction under the
    /// trip row lock, so a checkout committing concurrently can never be
    /// overwritten and the guard columns never move without the `checkin`
    /// event that marks the new episode.
    pub async fn checkin(
        &self,
        trip_id: Uuid,
        user_id: i64,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Trip> {
        self.require_accepted(trip_id, user_id, "checkin").await?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let trip = self
            .db
            .trips
            .find_for_update(&mut tx, trip_id)
            .await?
            .ok_or(TripGuardError::TripNotFound { trip_id })?;
        let status = trip.lifecycle_status();
        if !status.is_underway() {
            tx.rollback().await?;
            return Err(TripGuardError::state_conflict(
                status,
                "checkin",
                "trip is not underway",
            ));
        }

        self.db
            .participants
            .record_checkin_tx(&mut tx, trip_id, user_id, now, lat, lon)
            .await?;
        self.db
            .trips
            .record_checkin_tx(&mut tx, trip_id, now, lat, lon)
            .await?;
        if !self.db.trips.reactivate_tx(&mut tx, trip_id, now).await? {
            tx.rollback().await?;
            return Err(TripGuardError::state_conflict(
                status,
                "checkin",
                "trip is no longer underway",
            ));
        }
        self.db
            .events
            .record_tx(
                &mut tx,
                trip_id,
                EventKind::Checkin,
                Some(serde_json::json!({ "user_id": user_id, "lat": lat, "lon": lon })),
            )
            .await?;
        tx.commit().await?;

        crate::utils::logging::log_transition(trip_id, status.as_str(), "active", "checkin");
        self.get_trip(trip_id).await
    }

    /// Extend the ETA by `minutes`. For a trip already past its ETA the new
    /// deadline counts from now, never from the stale ETA. Runs in one
    /// transaction under the trip row lock, like `checkin`.
    pub async fn extend(
        &self,
        trip_id: Uuid,
        user_id: i64,
        minutes: i64,
    ) -> Result<DateTime<Utc>> {
        if minutes <= 0 {
            return Err(TripGuardError::Validation(
                "Extension must be a positive number of minutes".to_string(),
            ));
        }
        if minutes > MAX_EXTENSION_MINUTES {
            return Err(TripGuardError::Validation(format!(
                "Extension cannot exceed {MAX_EXTENSION_MINUTES} minutes"
            )));
        }

        self.require_accepted(trip_id, user_id, "extend").await?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let trip = self
            .db
            .trips
            .find_for_update(&mut tx, trip_id)
            .await?
            .ok_or(TripGuardError::TripNotFound { trip_id })?;
        let status = trip.lifecycle_status();
        if !status.is_underway() {
            tx.rollback().await?;
            return Err(TripGuardError::state_conflict(
                status,
                "extend",
                "trip is not underway",
            ));
        }

        let new_eta = extended_eta(trip.eta_at, now, minutes);
        self.db.trips.set_eta_tx(&mut tx, trip_id, new_eta).await?;
        if !self.db.trips.reactivate_tx(&mut tx, trip_id, now).await? {
            tx.rollback().await?;
            return Err(TripGuardError::state_conflict(
                status,
                "extend",
                "trip is no longer underway",
            ));
        }
        self.db
            .events
            .record_tx(
                &mut tx,
                trip_id,
                EventKind::Extended,
                Some(serde_json::json!({
                    "user_id": user_id,
                    "minutes": minutes,
                    "new_eta": new_eta,
                })),
            )
            .await?;
        tx.commit().await?;

        crate::utils::logging::log_transition(trip_id, status.as_str(), "active", "extend");
        Ok(new_eta)
    }

    /// Cancel a trip that has not begun escalating. Owner only; the status
    /// check and both writes share one row-locked transaction.
    pub async fn cancel(&self, trip_id: Uuid, user_id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let trip = self
            .db
            .trips
            .find_for_update(&mut tx, trip_id)
            .await?
            .ok_or(TripGuardError::TripNotFound { trip_id })?;
        if trip.owner_id != user_id {
            tx.rollback().await?;
            return Err(TripGuardError::PermissionDenied(
                "Only the trip owner can cancel".to_string(),
            ));
        }
        let status = trip.lifecycle_status();
        if !status.is_cancellable() {
            tx.rollback().await?;
            return Err(TripGuardError::state_conflict(
                status,
                "cancel",
                "check in or check out instead",
            ));
        }

        self.db.trips.cancel_tx(&mut tx, trip_id, Utc::now()).await?;
        self.db
            .events
            .record_tx(
                &mut tx,
                trip_id,
                EventKind::Cancelled,
                Some(serde_json::json!({ "user_id": user_id })),
            )
            .await?;
        tx.commit().await?;

        crate::utils::logging::log_transition(trip_id, status.as_str(), "cancelled", "cancel");
        Ok(())
    }

    /// Invite a user to a group trip. Idempotent for an already invited or
    /// accepted user.
    pub async fn invite(
        &self,
        trip_id: Uuid,
        inviter_id: i64,
        invitee_id: i64,
        display_name: &str,
    ) -> Result<Participant> {
        let trip = self.get_trip(trip_id).await?;
        if !trip.is_group_trip {
            return Err(TripGuardError::Validation(
                "Cannot invite participants to a solo trip".to_string(),
            ));
        }
        if trip.lifecycle_status().is_terminal() {
            return Err(TripGuardError::state_conflict(
                trip.lifecycle_status(),
                "invite",
                "trip already ended",
            ));
        }

        let inviter = self
            .db
            .participants
            .find(trip_id, inviter_id)
            .await?
            .ok_or(TripGuardError::ParticipantNotFound {
                trip_id,
                user_id: inviter_id,
            })?;
        let may_invite = inviter.is_owner() || (inviter.is_accepted() && trip.allow_participant_invites);
        if !may_invite {
            return Err(TripGuardError::PermissionDenied(
                "Not allowed to invite participants to this trip".to_string(),
            ));
        }

        if let Some(existing) = self.db.participants.find(trip_id, invitee_id).await? {
            return match existing.participant_status() {
                ParticipantStatus::Invited | ParticipantStatus::Accepted => Ok(existing),
                ParticipantStatus::Declined | ParticipantStatus::Left => {
                    Err(TripGuardError::Validation(
                        "User has already declined or left this trip".to_string(),
                    ))
                }
            };
        }

        let participant = self
            .db
            .participants
            .invite(&InviteParticipantRequest {
                trip_id,
                user_id: invitee_id,
                display_name: display_name.to_string(),
                invited_by: inviter_id,
            })
            .await?;
        self.notifications
            .notify_invite(&trip, invitee_id, &inviter.display_name)?;

        crate::utils::logging::log_trip_action(trip_id, inviter_id, "invite", None);
        Ok(participant)
    }

    /// Accept an invitation. Re-accepting is idempotent success.
    pub async fn accept(&self, trip_id: Uuid, user_id: i64) -> Result<Participant> {
        let trip = self.get_trip(trip_id).await?;
        if trip.lifecycle_status().is_terminal() {
            return Err(TripGuardError::state_conflict(
                trip.lifecycle_status(),
                "accept",
                "trip already ended",
            ));
        }

        let participant = self.require_participant(trip_id, user_id).await?;
        match participant.participant_status() {
            ParticipantStatus::Accepted => Ok(participant),
            ParticipantStatus::Invited => {
                let updated = self.db.participants.mark_accepted(trip_id, user_id).await?;
                crate::utils::logging::log_trip_action(trip_id, user_id, "accept", None);
                Ok(updated)
            }
            status => Err(TripGuardError::state_conflict(
                status.as_str(),
                "accept",
                "invitation is no longer open",
            )),
        }
    }

    /// Decline an invitation. Re-declining is idempotent success.
    pub async fn decline(&self, trip_id: Uuid, user_id: i64) -> Result<Participant> {
        let participant = self.require_participant(trip_id, user_id).await?;
        match participant.participant_status() {
            ParticipantStatus::Declined => Ok(participant),
            ParticipantStatus::Invited => {
                let updated = self.db.participants.mark_declined(trip_id, user_id).await?;
                crate::utils::logging::log_trip_action(trip_id, user_id, "decline", None);
                Ok(updated)
            }
            status => Err(TripGuardError::state_conflict(
                status.as_str(),
                "decline",
                "invitation is no longer open",
            )),
        }
    }

    /// Leave a trip. The leaver's outstanding checkout vote is removed, so
    /// the next tally is computed against the smaller roster.
    pub async fn leave(&self, trip_id: Uuid, user_id: i64) -> Result<()> {
        let participant = self.require_participant(trip_id, user_id).await?;
        if participant.is_owner() {
            return Err(TripGuardError::PermissionDenied(
                "The trip owner cannot leave their own trip".to_string(),
            ));
        }
        if participant.participant_status() != ParticipantStatus::Accepted {
            return Err(TripGuardError::state_conflict(
                participant.status.as_str(),
                "leave",
                "only accepted participants can leave",
            ));
        }

        self.db.participants.mark_left(trip_id, user_id).await?;
        self.db.votes.delete_for_user(trip_id, user_id).await?;

        crate::utils::logging::log_trip_action(trip_id, user_id, "leave", None);
        Ok(())
    }

    /// Remove a participant from a trip. Owner only; the owner row itself
    /// cannot be removed.
    pub async fn remove_participant(
        &self,
        trip_id: Uuid,
        caller_id: i64,
        target_user_id: i64,
    ) -> Result<()> {
        let trip = self.get_trip(trip_id).await?;
        if trip.owner_id != caller_id {
            return Err(TripGuardError::PermissionDenied(
                "Only the trip owner can remove participants".to_string(),
            ));
        }
        let target = self.require_participant(trip_id, target_user_id).await?;
        if target.is_owner() {
            return Err(TripGuardError::PermissionDenied(
                "The owner cannot be removed from their own trip".to_string(),
            ));
        }

        self.db.participants.mark_left(trip_id, target_user_id).await?;
        self.db.votes.delete_for_user(trip_id, target_user_id).await?;

        crate::utils::logging::log_trip_action(trip_id, caller_id, "remove_participant", None);
        Ok(())
    }

    /// Ordered lifecycle timeline for a trip
    pub async fn list_timeline(&self, trip_id: Uuid) -> Result<Vec<TripEvent>> {
        // Surface a 404-style error for unknown trips rather than an empty list.
        self.get_trip(trip_id).await?;
        self.db.events.list_for_trip(trip_id).await
    }

    async fn require_participant(&self, trip_id: Uuid, user_id: i64) -> Result<Participant> {
        self.db
            .participants
            .find(trip_id, user_id)
            .await?
            .ok_or(TripGuardError::ParticipantNotFound { trip_id, user_id })
    }

    /// The caller must be on the roster and currently accepted (the owner
    /// row always is). An invited-but-not-accepted participant cannot act.
    async fn require_accepted(&self, trip_id: Uuid, user_id: i64, action: &str) -> Result<Participant> {
        let participant = self.require_participant(trip_id, user_id).await?;
        if !participant.is_accepted() {
            return Err(TripGuardError::PermissionDenied(format!(
                "User {user_id} has not accepted this trip and cannot {action}"
            )));
        }
        Ok(participant)
    }
}
