//! Participant model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Owner,
    Participant,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Owner => "owner",
            ParticipantRole::Participant => "participant",
        }
    }

    pub fn parse(s: &str) -> Option<ParticipantRole> {
        match s {
            "owner" => Some(ParticipantRole::Owner),
            "participant" => Some(ParticipantRole::Participant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Invited,
    Accepted,
    Declined,
    Left,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Invited => "invited",
            ParticipantStatus::Accepted => "accepted",
            ParticipantStatus::Declined => "declined",
            ParticipantStatus::Left => "left",
        }
    }

    pub fn parse(s: &str) -> Option<ParticipantStatus> {
        match s {
            "invited" => Some(ParticipantStatus::Invited),
            "accepted" => Some(ParticipantStatus::Accepted),
            "declined" => Some(ParticipantStatus::Declined),
            "left" => Some(ParticipantStatus::Left),
            _ => None,
        }
    }
}

/// One row per (trip, user). The owner row is created accepted at trip
/// creation; everyone else arrives as invited.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: i64,
    pub trip_id: Uuid,
    pub user_id: i64,
    pub display_name: String,
    pub role: String,
    pub status: String,
    pub invited_by: Option<i64>,
    pub invited_at: DateTime<Utc>,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
    pub last_checkin_at: Option<DateTime<Utc>>,
    pub last_lat: Option<f64>,
    pub last_lon: Option<f64>,
}

impl Participant {
    pub fn participant_role(&self) -> ParticipantRole {
        ParticipantRole::parse(&self.role).unwrap_or(ParticipantRole::Participant)
    }

    pub fn participant_status(&self) -> ParticipantStatus {
        ParticipantStatus::parse(&self.status).unwrap_or(ParticipantStatus::Invited)
    }

    pub fn is_owner(&self) -> bool {
        self.participant_role() == ParticipantRole::Owner
    }

    pub fn is_accepted(&self) -> bool {
        self.participant_status() == ParticipantStatus::Accepted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteParticipantRequest {
    pub trip_id: Uuid,
    pub user_id: i64,
    pub display_name: String,
    pub invited_by: i64,
}
