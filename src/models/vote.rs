//! Checkout vote model and quorum arithmetic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per (trip, user) who has voted to end a group trip
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckoutVote {
    pub id: i64,
    pub trip_id: Uuid,
    pub user_id: i64,
    pub cast_at: DateTime<Utc>,
}

/// Running tally returned to the caller of `complete_or_vote`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub votes_cast: i64,
    pub votes_needed: i64,
    pub completed: bool,
}

/// Votes required to reach quorum.
///
/// `ceil(accepted × threshold)` with a floor of one, so a zero threshold
/// still requires somebody to actually vote.
pub fn votes_needed(accepted_count: i64, threshold: f64) -> i64 {
    if accepted_count <= 0 {
        return 1;
    }
    let needed = (accepted_count as f64 * threshold).ceil() as i64;
    needed.max(1)
}
