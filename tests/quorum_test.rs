//! Checkout quorum integration tests
//!
//! Vote tallies, mode enforcement and the concurrent-voter race, against a
//! real database. They run only when `TRIPGUARD_TEST_DATABASE_URL` is set;
//! without it every test returns early.

mod helpers;

use assert_matches::assert_matches;
use serial_test::serial;
use uuid::Uuid;

use tripguard::models::event::EventKind;
use tripguard::models::trip::{CheckoutMode, TripStatus};
use tripguard::utils::errors::TripGuardError;

use helpers::{active_group_trip, settle, test_context, unique_user_id, TestContext};

/// Group trip with the owner plus `extra` accepted participants
async fn group_trip(
    ctx: &TestContext,
    mode: CheckoutMode,
    threshold: f64,
    extra: usize,
) -> (Uuid, i64, Vec<i64>) {
    let owner = unique_user_id();
    let trip = ctx
        .services
        .trips
        .create_trip(&active_group_trip(owner, mode, threshold))
        .await
        .unwrap();

    let mut members = Vec::new();
    for i in 0..extra {
        let member = unique_user_id();
        ctx.services
            .trips
            .invite(trip.id, owner, member, &format!("member-{i}"))
            .await
            .unwrap();
        ctx.services.trips.accept(trip.id, member).await.unwrap();
        members.push(member);
    }

    (trip.id, owner, members)
}

async fn checkout_events(ctx: &TestContext, trip_id: Uuid) -> usize {
    ctx.db
        .events
        .list_for_trip(trip_id)
        .await
        .unwrap()
        .iter()
        .filter(|e| e.kind == EventKind::Checkout.as_str())
        .count()
}

#[tokio::test]
#[serial]
async fn test_vote_threshold_progression() {
    let Some(ctx) = test_context().await else { return };
    // Three accepted participants, threshold 0.5: two votes needed.
    let (trip_id, owner, members) = group_trip(&ctx, CheckoutMode::Vote, 0.5, 2).await;

    let first = ctx.services.quorum.complete_or_vote(trip_id, owner).await.unwrap();
    assert_eq!(first.votes_cast, 1);
    assert_eq!(first.votes_needed, 2);
    assert!(!first.completed);

    // Voting twice does not advance the tally.
    let again = ctx.services.quorum.complete_or_vote(trip_id, owner).await.unwrap();
    assert_eq!(again.votes_cast, 1);
    assert!(!again.completed);

    let second = ctx
        .services
        .quorum
        .complete_or_vote(trip_id, members[0])
        .await
        .unwrap();
    assert!(second.completed);
    assert_eq!(second.votes_cast, 2);

    let trip = ctx.services.trips.get_trip(trip_id).await.unwrap();
    assert_eq!(trip.lifecycle_status(), TripStatus::Completed);
    assert_eq!(checkout_events(&ctx, trip_id).await, 1);

    // A vote after completion is idempotent success without a second
    // completion.
    let late = ctx
        .services
        .quorum
        .complete_or_vote(trip_id, members[1])
        .await
        .unwrap();
    assert!(late.completed);
    assert_eq!(checkout_events(&ctx, trip_id).await, 1);
}

#[tokio::test]
#[serial]
async fn test_concurrent_votes_complete_once() {
    let Some(ctx) = test_context().await else { return };
    // Two participants, threshold 0.5: a single vote completes, so two
    // simultaneous voters race for the same completion.
    let (trip_id, owner, members) = group_trip(&ctx, CheckoutMode::Vote, 0.5, 1).await;

    let (a, b) = tokio::join!(
        ctx.services.quorum.complete_or_vote(trip_id, owner),
        ctx.services.quorum.complete_or_vote(trip_id, members[0]),
    );
    assert!(a.unwrap().completed);
    assert!(b.unwrap().completed);

    let trip = ctx.services.trips.get_trip(trip_id).await.unwrap();
    assert_eq!(trip.lifecycle_status(), TripStatus::Completed);
    assert_eq!(checkout_events(&ctx, trip_id).await, 1);
}

#[tokio::test]
#[serial]
async fn test_leaving_shrinks_the_quorum() {
    let Some(ctx) = test_context().await else { return };
    // Three accepted, threshold 0.5: two votes needed.
    let (trip_id, owner, members) = group_trip(&ctx, CheckoutMode::Vote, 0.5, 2).await;

    let first = ctx
        .services
        .quorum
        .complete_or_vote(trip_id, members[0])
        .await
        .unwrap();
    assert!(!first.completed);
    assert_eq!(first.votes_needed, 2);

    // One participant leaves: two accepted remain, one vote now suffices.
    ctx.services.trips.leave(trip_id, members[1]).await.unwrap();

    let second = ctx.services.quorum.complete_or_vote(trip_id, owner).await.unwrap();
    assert!(second.completed);
    assert_eq!(second.votes_needed, 1);
}

#[tokio::test]
#[serial]
async fn test_leaver_vote_is_discarded() {
    let Some(ctx) = test_context().await else { return };
    let (trip_id, owner, members) = group_trip(&ctx, CheckoutMode::Vote, 1.0, 2).await;

    // Threshold 1.0 over three accepted: all three votes needed.
    let first = ctx
        .services
        .quorum
        .complete_or_vote(trip_id, members[0])
        .await
        .unwrap();
    assert_eq!(first.votes_needed, 3);

    // The voter leaves; their ballot must not count toward the new quorum.
    ctx.services.trips.leave(trip_id, members[0]).await.unwrap();

    let second = ctx.services.quorum.complete_or_vote(trip_id, owner).await.unwrap();
    assert_eq!(second.votes_needed, 2);
    assert_eq!(second.votes_cast, 1);
    assert!(!second.completed);
}

#[tokio::test]
#[serial]
async fn test_owner_only_mode() {
    let Some(ctx) = test_context().await else { return };
    let (trip_id, owner, members) = group_trip(&ctx, CheckoutMode::OwnerOnly, 0.5, 1).await;

    let result = ctx.services.quorum.complete_or_vote(trip_id, members[0]).await;
    assert_matches!(result, Err(TripGuardError::PermissionDenied(_)));

    let outcome = ctx.services.quorum.complete_or_vote(trip_id, owner).await.unwrap();
    assert!(outcome.completed);

    let trip = ctx.services.trips.get_trip(trip_id).await.unwrap();
    assert_eq!(trip.lifecycle_status(), TripStatus::Completed);
}

#[tokio::test]
#[serial]
async fn test_anyone_mode_completes_immediately() {
    let Some(ctx) = test_context().await else { return };
    let (trip_id, _owner, members) = group_trip(&ctx, CheckoutMode::Anyone, 0.5, 1).await;

    let outcome = ctx
        .services
        .quorum
        .complete_or_vote(trip_id, members[0])
        .await
        .unwrap();
    assert!(outcome.completed);
    assert_eq!(checkout_events(&ctx, trip_id).await, 1);
}

#[tokio::test]
#[serial]
async fn test_invited_participant_cannot_vote() {
    let Some(ctx) = test_context().await else { return };
    let (trip_id, owner, _) = group_trip(&ctx, CheckoutMode::Vote, 0.5, 0).await;
    let invitee = unique_user_id();
    ctx.services
        .trips
        .invite(trip_id, owner, invitee, "Bob")
        .await
        .unwrap();

    let result = ctx.services.quorum.complete_or_vote(trip_id, invitee).await;
    assert_matches!(result, Err(TripGuardError::PermissionDenied(_)));

    let stranger = unique_user_id();
    let result = ctx.services.quorum.complete_or_vote(trip_id, stranger).await;
    assert_matches!(result, Err(TripGuardError::ParticipantNotFound { .. }));
}

#[tokio::test]
#[serial]
async fn test_retracted_vote_no_longer_counts() {
    let Some(ctx) = test_context().await else { return };
    let (trip_id, owner, members) = group_trip(&ctx, CheckoutMode::Vote, 0.5, 2).await;

    let first = ctx
        .services
        .quorum
        .complete_or_vote(trip_id, members[0])
        .await
        .unwrap();
    assert!(!first.completed);

    ctx.services
        .quorum
        .retract_vote(trip_id, members[0])
        .await
        .unwrap();

    // Only one live ballot after the owner votes, still short of two.
    let second = ctx.services.quorum.complete_or_vote(trip_id, owner).await.unwrap();
    assert_eq!(second.votes_cast, 1);
    assert!(!second.completed);
}

#[tokio::test]
#[serial]
async fn test_vote_progress_notifies_other_participants() {
    let Some(ctx) = test_context().await else { return };
    let (trip_id, _owner, members) = group_trip(&ctx, CheckoutMode::Vote, 1.0, 2).await;

    ctx.services
        .quorum
        .complete_or_vote(trip_id, members[0])
        .await
        .unwrap();

    settle().await;
    let progress = ctx
        .sender
        .subjects()
        .await
        .iter()
        .filter(|s| s.contains("Checkout vote"))
        .count();
    // The owner and the other member hear about the ballot; the voter
    // does not.
    assert_eq!(progress, 2);
}
