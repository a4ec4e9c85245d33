//! Lifecycle scheduler
//!
//! The periodic process that detects time-based transitions: start reached,
//! ETA passed, grace period expired, and the push-style reminders. Every
//! action is gated by a durable guard (an event-log entry or a column on
//! the trip row), so a pass that crashes or overlaps a user action is safe
//! to re-run; nothing fires twice.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::database::DatabaseService;
use crate::models::event::EventKind;
use crate::models::trip::{ReminderKind, ReminderSchedule, Trip};
use crate::services::notification::NotificationService;
use crate::utils::errors::Result;

/// Periodic lifecycle scheduler. Explicitly constructed with its
/// dependencies and owning its own start/stop lifecycle; there is no global
/// instance.
pub struct LifecycleScheduler {
    db: DatabaseService,
    notifications: NotificationService,
    tick: Duration,
    schedule: ReminderSchedule,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleScheduler {
    pub fn new(
        db: DatabaseService,
        notifications: NotificationService,
        config: &SchedulerConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            db,
            notifications,
            tick: Duration::from_secs(config.tick_seconds),
            schedule: ReminderSchedule {
                starting_soon_lead: config.starting_soon_lead_minutes,
                approaching_eta_lead: config.approaching_eta_lead_minutes,
                checkin_reminder_every: config.checkin_reminder_minutes,
                grace_warning_every: config.grace_warning_minutes,
            },
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn the periodic loop. The returned handle completes after `stop`.
    pub fn start(&self) -> JoinHandle<()> {
        let db = self.db.clone();
        let notifications = self.notifications.clone();
        let tick = self.tick;
        let schedule = self.schedule;
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(tick_seconds = tick.as_secs(), "Lifecycle scheduler starting");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_pass(&db, &notifications, &schedule).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Lifecycle scheduler stopping");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal the loop to stop after the current pass. Consumes the
    /// scheduler: its notification handle holds a dispatcher clone, and the
    /// dispatch workers only exit once every clone is gone.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// One full scheduler pass. Public so integration tests can drive passes
/// deterministically without the timer.
pub async fn run_pass(
    db: &DatabaseService,
    notifications: &NotificationService,
    schedule: &ReminderSchedule,
) {
    let now = chrono::Utc::now();

    promote_started_trips(db, now).await;
    escalate_overdue_trips(db, notifications, now).await;
    send_due_reminders(db, notifications, schedule, now).await;
}

/// Phase 1: planned trips whose start time has arrived become active.
async fn promote_started_trips(db: &DatabaseService, now: chrono::DateTime<chrono::Utc>) {
    let trips = match db.trips.list_due_to_start(now).await {
        Ok(trips) => trips,
        Err(e) => {
            warn!(error = %e, "Scheduler could not scan for due-to-start trips");
            return;
        }
    };

    for trip in trips {
        if let Err(e) = promote_one(db, &trip).await {
            log_trip_failure(&trip, "promote", &e);
        }
    }
}

async fn promote_one(db: &DatabaseService, trip: &Trip) -> Result<()> {
    db.events.record(trip.id, EventKind::Started, None).await?;
    db.trips.promote_to_active(trip.id).await?;
    crate::utils::logging::log_transition(trip.id, "planned", "active", "start_at reached");
    Ok(())
}

/// Phase 2: overdue detection and grace-expiry escalation, guarded by the
/// event log so repeated passes never re-notify.
async fn escalate_overdue_trips(
    db: &DatabaseService,
    notifications: &NotificationService,
    now: chrono::DateTime<chrono::Utc>,
) {
    let trips = match db.trips.list_past_eta(now).await {
        Ok(trips) => trips,
        Err(e) => {
            warn!(error = %e, "Scheduler could not scan for overdue trips");
            return;
        }
    };

    for trip in trips {
        if let Err(e) = escalate_one(db, notifications, &trip, now).await {
            log_trip_failure(&trip, "escalate", &e);
        }
    }
}

async fn escalate_one(
    db: &DatabaseService,
    notifications: &NotificationService,
    trip: &Trip,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if !db
        .events
        .exists_in_current_episode(trip.id, EventKind::Overdue)
        .await?
    {
        db.events.record(trip.id, EventKind::Overdue, None).await?;
        db.trips.mark_overdue(trip.id).await?;
        crate::utils::logging::log_transition(trip.id, &trip.status, "overdue", "eta passed");
        return Ok(());
    }

    if trip.past_grace(now)
        && !db
            .events
            .exists_in_current_episode(trip.id, EventKind::Notify)
            .await?
    {
        // Guard first: the notify event commits before delivery is even
        // scheduled, making escalation at-most-once under crashes.
        db.events
            .record(
                trip.id,
                EventKind::Notify,
                Some(serde_json::json!({ "grace_deadline": trip.grace_deadline() })),
            )
            .await?;
        db.trips.mark_overdue_notified(trip.id).await?;
        crate::utils::logging::log_transition(
            trip.id,
            &trip.status,
            "overdue_notified",
            "grace expired",
        );

        let recipients = notifications.notify_trip_overdue(trip).await?;
        if recipients == 0 {
            warn!(trip_id = %trip.id, "Overdue escalation had no configured contacts");
        }
    }

    Ok(())
}

/// Phase 3: push-style reminders, one guard per trigger. Independent of the
/// escalation path but evaluated on the same cadence.
async fn send_due_reminders(
    db: &DatabaseService,
    notifications: &NotificationService,
    schedule: &ReminderSchedule,
    now: chrono::DateTime<chrono::Utc>,
) {
    let trips = match db.trips.list_unfinished().await {
        Ok(trips) => trips,
        Err(e) => {
            warn!(error = %e, "Scheduler could not scan for reminder candidates");
            return;
        }
    };

    for trip in trips {
        for kind in ReminderKind::ALL {
            if !trip.reminder_due(kind, now, schedule) {
                continue;
            }
            if let Err(e) = send_one_reminder(db, notifications, &trip, kind, now).await {
                log_trip_failure(&trip, kind.as_str(), &e);
            }
        }
    }
}

async fn send_one_reminder(
    db: &DatabaseService,
    notifications: &NotificationService,
    trip: &Trip,
    kind: ReminderKind,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    db.trips.mark_reminder_sent(trip.id, kind, now).await?;
    notifications.send_reminder(trip, kind).await?;
    debug!(trip_id = %trip.id, reminder = %kind, "Reminder dispatched");
    Ok(())
}

/// A failure on one trip never aborts the pass; transient errors retry on
/// the next tick.
fn log_trip_failure(trip: &Trip, phase: &str, e: &crate::utils::errors::TripGuardError) {
    if e.is_transient() {
        warn!(trip_id = %trip.id, phase = phase, error = %e, "Scheduler step failed, will retry next tick");
    } else {
        error!(trip_id = %trip.id, phase = phase, error = %e, "Scheduler step failed");
    }
}
