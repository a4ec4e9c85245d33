//! Trip model and lifecycle state machine
//!
//! The pure parts of the lifecycle engine live here: status parsing, the
//! time predicates the scheduler evaluates, and the transition rules shared
//! by the scheduler and the user-action handlers. Nothing in this module
//! touches the store, so the state machine is testable in isolation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Trip lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Planned,
    Active,
    Overdue,
    OverdueNotified,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Planned => "planned",
            TripStatus::Active => "active",
            TripStatus::Overdue => "overdue",
            TripStatus::OverdueNotified => "overdue_notified",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<TripStatus> {
        match s {
            "planned" => Some(TripStatus::Planned),
            "active" => Some(TripStatus::Active),
            "overdue" => Some(TripStatus::Overdue),
            "overdue_notified" => Some(TripStatus::OverdueNotified),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// A trip that has started and not yet ended; check-in, extend and
    /// checkout are only meaningful here.
    pub fn is_underway(&self) -> bool {
        matches!(
            self,
            TripStatus::Active | TripStatus::Overdue | TripStatus::OverdueNotified
        )
    }

    /// Whether the owner may still cancel. Once escalation has begun the
    /// honest exits are check-in or checkout, not cancel.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, TripStatus::Planned | TripStatus::Active)
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a group trip gets checked out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// Any accepted participant ends the trip alone
    #[default]
    Anyone,
    /// A threshold fraction of accepted participants must agree
    Vote,
    /// Only the owner's checkout counts
    OwnerOnly,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Anyone => "anyone",
            CheckoutMode::Vote => "vote",
            CheckoutMode::OwnerOnly => "owner_only",
        }
    }

    pub fn parse(s: &str) -> Option<CheckoutMode> {
        match s {
            "anyone" => Some(CheckoutMode::Anyone),
            "vote" => Some(CheckoutMode::Vote),
            "owner_only" => Some(CheckoutMode::OwnerOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Group behaviour settings, embedded in the trip row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSettings {
    pub checkout_mode: CheckoutMode,
    pub vote_threshold: f64,
    pub allow_participant_invites: bool,
    pub share_locations: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            checkout_mode: CheckoutMode::Anyone,
            vote_threshold: 0.5,
            allow_participant_invites: false,
            share_locations: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub owner_id: i64,
    pub activity: String,
    pub details: Option<String>,
    pub start_at: DateTime<Utc>,
    pub eta_at: DateTime<Utc>,
    pub grace_minutes: i32,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub starting_soon_sent: bool,
    pub started_sent: bool,
    pub approaching_eta_sent: bool,
    pub eta_reached_sent: bool,
    pub checkin_reminder_sent_at: Option<DateTime<Utc>>,
    pub grace_warning_sent_at: Option<DateTime<Utc>>,
    pub is_group_trip: bool,
    pub checkout_mode: String,
    pub vote_threshold: f64,
    pub allow_participant_invites: bool,
    pub share_locations: bool,
    pub last_checkin_at: Option<DateTime<Utc>>,
    pub last_lat: Option<f64>,
    pub last_lon: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Parsed lifecycle status. The column carries a CHECK constraint, so
    /// an unknown value never appears in a well-formed database.
    pub fn lifecycle_status(&self) -> TripStatus {
        TripStatus::parse(&self.status).unwrap_or_default()
    }

    /// Parsed checkout mode for group trips.
    pub fn group_checkout_mode(&self) -> CheckoutMode {
        CheckoutMode::parse(&self.checkout_mode).unwrap_or_default()
    }

    /// A planned trip whose start time has arrived.
    pub fn due_to_start(&self, now: DateTime<Utc>) -> bool {
        self.lifecycle_status() == TripStatus::Planned && self.start_at <= now
    }

    /// ETA has passed, regardless of grace.
    pub fn past_eta(&self, now: DateTime<Utc>) -> bool {
        self.eta_at < now
    }

    /// The moment after which contacts get alerted.
    pub fn grace_deadline(&self) -> DateTime<Utc> {
        self.eta_at + Duration::minutes(self.grace_minutes as i64)
    }

    /// The grace window has fully elapsed.
    pub fn past_grace(&self, now: DateTime<Utc>) -> bool {
        now > self.grace_deadline()
    }

    /// Within the lead window before `start_at`.
    pub fn starting_soon(&self, now: DateTime<Utc>, lead_minutes: i64) -> bool {
        let window_open = self.start_at - Duration::minutes(lead_minutes);
        now >= window_open && now < self.start_at
    }

    /// Within the lead window before `eta_at`.
    pub fn approaching_eta(&self, now: DateTime<Utc>, lead_minutes: i64) -> bool {
        let window_open = self.eta_at - Duration::minutes(lead_minutes);
        now >= window_open && now < self.eta_at
    }
}

/// Largest single extension accepted, 30 days in minutes. Keeps the
/// chrono `Duration` arithmetic below well inside its valid range.
pub const MAX_EXTENSION_MINUTES: i64 = 60 * 24 * 30;

/// New ETA after an extension of `minutes`.
///
/// Extending an already-late trip counts from now, not from the stale ETA,
/// so a user who is hours past their ETA never computes a deadline still in
/// the past.
pub fn extended_eta(
    eta_at: DateTime<Utc>,
    now: DateTime<Utc>,
    minutes: i64,
) -> DateTime<Utc> {
    let base = if eta_at < now { now } else { eta_at };
    base + Duration::minutes(minutes)
}

/// Push-style reminders evaluated by the scheduler, each backed by its own
/// guard column on the trip row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    StartingSoon,
    Started,
    ApproachingEta,
    EtaReached,
    CheckinReminder,
    GraceWarning,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::StartingSoon => "starting_soon",
            ReminderKind::Started => "started",
            ReminderKind::ApproachingEta => "approaching_eta",
            ReminderKind::EtaReached => "eta_reached",
            ReminderKind::CheckinReminder => "checkin_reminder",
            ReminderKind::GraceWarning => "grace_warning",
        }
    }

    pub const ALL: [ReminderKind; 6] = [
        ReminderKind::StartingSoon,
        ReminderKind::Started,
        ReminderKind::ApproachingEta,
        ReminderKind::EtaReached,
        ReminderKind::CheckinReminder,
        ReminderKind::GraceWarning,
    ];
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reminder lead windows and repeat cadences, all in minutes
#[derive(Debug, Clone, Copy)]
pub struct ReminderSchedule {
    pub starting_soon_lead: i64,
    pub approaching_eta_lead: i64,
    pub checkin_reminder_every: i64,
    pub grace_warning_every: i64,
}

impl Default for ReminderSchedule {
    fn default() -> Self {
        Self {
            starting_soon_lead: 15,
            approaching_eta_lead: 15,
            checkin_reminder_every: 30,
            grace_warning_every: 5,
        }
    }
}

impl Trip {
    /// Whether a reminder should fire now: the time window is open and the
    /// corresponding guard has not fired yet (or, for repeating reminders,
    /// the cadence has elapsed since the last send).
    ///
    /// The guard check happens before any send, so re-running a scheduler
    /// pass never duplicates a reminder.
    pub fn reminder_due(
        &self,
        kind: ReminderKind,
        now: DateTime<Utc>,
        schedule: &ReminderSchedule,
    ) -> bool {
        let status = self.lifecycle_status();
        match kind {
            ReminderKind::StartingSoon => {
                status == TripStatus::Planned
                    && !self.starting_soon_sent
                    && self.starting_soon(now, schedule.starting_soon_lead)
            }
            ReminderKind::Started => {
                status == TripStatus::Active && !self.started_sent && self.start_at <= now
            }
            ReminderKind::ApproachingEta => {
                status == TripStatus::Active
                    && !self.approaching_eta_sent
                    && self.approaching_eta(now, schedule.approaching_eta_lead)
            }
            ReminderKind::EtaReached => {
                status.is_underway() && !self.eta_reached_sent && self.past_eta(now)
            }
            ReminderKind::CheckinReminder => {
                status == TripStatus::Active
                    && match self.checkin_reminder_sent_at {
                        None => now >= self.start_at + Duration::minutes(schedule.checkin_reminder_every),
                        Some(last) => now >= last + Duration::minutes(schedule.checkin_reminder_every),
                    }
            }
            ReminderKind::GraceWarning => {
                status == TripStatus::Overdue
                    && match self.grace_warning_sent_at {
                        None => true,
                        Some(last) => now >= last + Duration::minutes(schedule.grace_warning_every),
                    }
            }
        }
    }
}

/// Request payload for creating a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTripRequest {
    pub owner_id: i64,
    pub owner_display_name: String,
    pub activity: String,
    pub details: Option<String>,
    pub start_at: DateTime<Utc>,
    pub eta_at: DateTime<Utc>,
    pub grace_minutes: i32,
    pub is_group_trip: bool,
    pub group_settings: Option<GroupSettings>,
}

impl CreateTripRequest {
    /// Synchronous input validation, rejected before anything is written.
    pub fn validate(&self) -> Result<(), String> {
        if self.activity.trim().is_empty() {
            return Err("Activity description is required".to_string());
        }
        if self.eta_at <= self.start_at {
            return Err("ETA must be after the start time".to_string());
        }
        if self.grace_minutes < 0 {
            return Err("Grace period cannot be negative".to_string());
        }
        if let Some(settings) = &self.group_settings {
            if !(0.0..=1.0).contains(&settings.vote_threshold) {
                return Err("Vote threshold must be between 0 and 1".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_trip(status: TripStatus) -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            owner_id: 1,
            activity: "Solo hike".to_string(),
            details: None,
            start_at: now - Duration::hours(2),
            eta_at: now - Duration::hours(1),
            grace_minutes: 30,
            status: status.as_str().to_string(),
            completed_at: None,
            starting_soon_sent: false,
            started_sent: false,
            approaching_eta_sent: false,
            eta_reached_sent: false,
            checkin_reminder_sent_at: None,
            grace_warning_sent_at: None,
            is_group_trip: false,
            checkout_mode: CheckoutMode::Anyone.as_str().to_string(),
            vote_threshold: 0.5,
            allow_participant_invites: false,
            share_locations: false,
            last_checkin_at: None,
            last_lat: None,
            last_lon: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TripStatus::Planned,
            TripStatus::Active,
            TripStatus::Overdue,
            TripStatus::OverdueNotified,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            assert_eq!(TripStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TripStatus::parse("paused"), None);
    }

    #[test]
    fn test_terminal_and_underway() {
        assert!(TripStatus::Completed.is_terminal());
        assert!(TripStatus::Cancelled.is_terminal());
        assert!(!TripStatus::Overdue.is_terminal());

        assert!(TripStatus::Active.is_underway());
        assert!(TripStatus::Overdue.is_underway());
        assert!(TripStatus::OverdueNotified.is_underway());
        assert!(!TripStatus::Planned.is_underway());
        assert!(!TripStatus::Completed.is_underway());
    }

    #[test]
    fn test_cancellable_only_before_escalation() {
        assert!(TripStatus::Planned.is_cancellable());
        assert!(TripStatus::Active.is_cancellable());
        assert!(!TripStatus::Overdue.is_cancellable());
        assert!(!TripStatus::OverdueNotified.is_cancellable());
        assert!(!TripStatus::Completed.is_cancellable());
    }

    #[test]
    fn test_due_to_start() {
        let now = Utc::now();
        let mut trip = base_trip(TripStatus::Planned);
        trip.start_at = now - Duration::minutes(1);
        assert!(trip.due_to_start(now));

        trip.start_at = now + Duration::minutes(5);
        assert!(!trip.due_to_start(now));

        // Only planned trips are promoted.
        trip.start_at = now - Duration::minutes(1);
        trip.status = TripStatus::Active.as_str().to_string();
        assert!(!trip.due_to_start(now));
    }

    #[test]
    fn test_grace_deadline() {
        let now = Utc::now();
        let mut trip = base_trip(TripStatus::Overdue);
        trip.eta_at = now - Duration::minutes(31);
        trip.grace_minutes = 30;
        assert!(trip.past_eta(now));
        assert!(trip.past_grace(now));

        trip.eta_at = now - Duration::minutes(10);
        assert!(trip.past_eta(now));
        assert!(!trip.past_grace(now));
    }

    #[test]
    fn test_starting_soon_window() {
        let now = Utc::now();
        let mut trip = base_trip(TripStatus::Planned);
        trip.start_at = now + Duration::minutes(10);
        assert!(trip.starting_soon(now, 15));
        assert!(!trip.starting_soon(now, 5));

        // Already started: not "soon" anymore.
        trip.start_at = now - Duration::minutes(1);
        assert!(!trip.starting_soon(now, 15));
    }

    #[test]
    fn test_extended_eta_before_eta() {
        let now = Utc::now();
        let eta = now + Duration::minutes(20);
        assert_eq!(extended_eta(eta, now, 30), eta + Duration::minutes(30));
    }

    #[test]
    fn test_extended_eta_when_overdue_counts_from_now() {
        let now = Utc::now();
        let stale_eta = now - Duration::hours(3);
        assert_eq!(extended_eta(stale_eta, now, 45), now + Duration::minutes(45));
    }

    #[test]
    fn test_extension_bound_stays_in_range() {
        let now = Utc::now();
        let eta = extended_eta(now, now, MAX_EXTENSION_MINUTES);
        assert_eq!(eta, now + Duration::days(30));
    }

    #[test]
    fn test_starting_soon_reminder_gated_by_guard() {
        let now = Utc::now();
        let schedule = ReminderSchedule::default();
        let mut trip = base_trip(TripStatus::Planned);
        trip.start_at = now + Duration::minutes(10);
        trip.eta_at = now + Duration::hours(2);

        assert!(trip.reminder_due(ReminderKind::StartingSoon, now, &schedule));
        trip.starting_soon_sent = true;
        assert!(!trip.reminder_due(ReminderKind::StartingSoon, now, &schedule));
    }

    #[test]
    fn test_eta_reached_fires_from_any_underway_status() {
        let now = Utc::now();
        let schedule = ReminderSchedule::default();
        for status in [TripStatus::Active, TripStatus::Overdue, TripStatus::OverdueNotified] {
            let trip = base_trip(status);
            assert!(trip.reminder_due(ReminderKind::EtaReached, now, &schedule));
        }
        let done = base_trip(TripStatus::Completed);
        assert!(!done.reminder_due(ReminderKind::EtaReached, now, &schedule));
    }

    #[test]
    fn test_checkin_reminder_repeats_on_cadence() {
        let now = Utc::now();
        let schedule = ReminderSchedule::default();
        let mut trip = base_trip(TripStatus::Active);
        trip.start_at = now - Duration::hours(1);
        trip.eta_at = now + Duration::hours(1);

        // Never sent, started over 30 minutes ago.
        assert!(trip.reminder_due(ReminderKind::CheckinReminder, now, &schedule));

        trip.checkin_reminder_sent_at = Some(now - Duration::minutes(10));
        assert!(!trip.reminder_due(ReminderKind::CheckinReminder, now, &schedule));

        trip.checkin_reminder_sent_at = Some(now - Duration::minutes(31));
        assert!(trip.reminder_due(ReminderKind::CheckinReminder, now, &schedule));
    }

    #[test]
    fn test_grace_warning_only_while_overdue() {
        let now = Utc::now();
        let schedule = ReminderSchedule::default();
        let mut trip = base_trip(TripStatus::Overdue);
        assert!(trip.reminder_due(ReminderKind::GraceWarning, now, &schedule));

        trip.grace_warning_sent_at = Some(now - Duration::minutes(2));
        assert!(!trip.reminder_due(ReminderKind::GraceWarning, now, &schedule));

        // Once contacts have been alerted, the warning stops.
        let notified = base_trip(TripStatus::OverdueNotified);
        assert!(!notified.reminder_due(ReminderKind::GraceWarning, now, &schedule));
    }

    #[test]
    fn test_create_request_validation() {
        let now = Utc::now();
        let mut req = CreateTripRequest {
            owner_id: 1,
            owner_display_name: "Alice".to_string(),
            activity: "Kayaking".to_string(),
            details: None,
            start_at: now,
            eta_at: now + Duration::hours(2),
            grace_minutes: 15,
            is_group_trip: false,
            group_settings: None,
        };
        assert!(req.validate().is_ok());

        req.eta_at = req.start_at;
        assert!(req.validate().is_err());

        req.eta_at = now + Duration::hours(2);
        req.grace_minutes = -1;
        assert!(req.validate().is_err());

        req.grace_minutes = 15;
        req.activity = "   ".to_string();
        assert!(req.validate().is_err());

        req.activity = "Kayaking".to_string();
        req.group_settings = Some(GroupSettings {
            vote_threshold: 1.5,
            ..GroupSettings::default()
        });
        assert!(req.validate().is_err());
    }
}
