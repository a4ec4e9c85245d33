//! Test helpers module
//!
//! Shared setup for the integration tests: a database-backed context gated
//! on `TRIPGUARD_TEST_DATABASE_URL` (tests skip silently when unset), a
//! capturing notification sender, and trip fixtures.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use tokio::sync::Mutex;

use tripguard::config::NotificationConfig;
use tripguard::database::DatabaseService;
use tripguard::models::trip::{CheckoutMode, CreateTripRequest, GroupSettings};
use tripguard::services::dispatch::{Dispatcher, NotificationSender, Recipient};
use tripguard::services::ServiceFactory;
use tripguard::Result;

/// Sender that records every delivery instead of transmitting anything
#[derive(Default)]
pub struct CapturingSender {
    pub delivered: Mutex<Vec<(Recipient, String, String)>>,
}

#[async_trait]
impl NotificationSender for CapturingSender {
    async fn send(&self, recipient: &Recipient, subject: &str, body: &str) -> Result<()> {
        self.delivered
            .lock()
            .await
            .push((recipient.clone(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

impl CapturingSender {
    pub async fn subjects(&self) -> Vec<String> {
        self.delivered.lock().await.iter().map(|(_, s, _)| s.clone()).collect()
    }
}

pub struct TestContext {
    pub db: DatabaseService,
    pub services: ServiceFactory,
    pub sender: Arc<CapturingSender>,
    pub schedule: tripguard::models::trip::ReminderSchedule,
}

/// Build a database-backed test context, or `None` when no test database
/// is configured.
pub async fn test_context() -> Option<TestContext> {
    let url = std::env::var("TRIPGUARD_TEST_DATABASE_URL").ok()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .ok()?;
    sqlx::migrate!("./migrations").run(&pool).await.ok()?;

    let db = DatabaseService::new(pool);
    let sender = Arc::new(CapturingSender::default());
    let config = NotificationConfig {
        gateway_url: "http://unused.invalid".to_string(),
        timeout_seconds: 5,
        queue_capacity: 256,
        workers: 1,
    };
    let (dispatcher, _handles) = Dispatcher::spawn(sender.clone(), &config);
    let services = ServiceFactory::new(db.clone(), dispatcher);

    Some(TestContext {
        db,
        services,
        sender,
        schedule: tripguard::models::trip::ReminderSchedule::default(),
    })
}

impl TestContext {
    /// One full scheduler pass, driven directly without the timer
    pub async fn run_scheduler_pass(&self) {
        tripguard::services::scheduler::run_pass(
            &self.db,
            &self.services.notifications,
            &self.schedule,
        )
        .await;
    }
}

/// Give the dispatch workers a moment to drain the queue before asserting
/// on captured deliveries.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
}

/// Random user id so tests sharing a database never collide
pub fn unique_user_id() -> i64 {
    rand::thread_rng().gen_range(1_000_000..i64::MAX / 2)
}

/// Solo trip that started two hours ago and whose ETA passed one hour ago
pub fn overdue_solo_trip(owner_id: i64, grace_minutes: i32) -> CreateTripRequest {
    let now = Utc::now();
    CreateTripRequest {
        owner_id,
        owner_display_name: format!("user-{owner_id}"),
        activity: "Solo night hike".to_string(),
        details: None,
        start_at: now - Duration::hours(2),
        eta_at: now - Duration::hours(1),
        grace_minutes,
        is_group_trip: false,
        group_settings: None,
    }
}

/// Group trip, already active, with the given checkout mode and threshold
pub fn active_group_trip(
    owner_id: i64,
    checkout_mode: CheckoutMode,
    vote_threshold: f64,
) -> CreateTripRequest {
    let now = Utc::now();
    CreateTripRequest {
        owner_id,
        owner_display_name: format!("user-{owner_id}"),
        activity: "Group climb".to_string(),
        details: Some("North ridge".to_string()),
        start_at: now - Duration::minutes(30),
        eta_at: now + Duration::hours(3),
        grace_minutes: 30,
        is_group_trip: true,
        group_settings: Some(GroupSettings {
            checkout_mode,
            vote_threshold,
            allow_participant_invites: false,
            share_locations: false,
        }),
    }
}
