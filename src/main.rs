//! TripGuard lifecycle daemon
//!
//! Main entry point: loads configuration, connects to the store, spawns
//! the notification dispatch workers and the lifecycle scheduler, then
//! runs until interrupted. The CRUD/API surface lives in a separate
//! service and talks to this engine through the library crate.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use tripguard::config::Settings;
use tripguard::database::{connection, DatabaseService};
use tripguard::services::{Dispatcher, LifecycleScheduler, ServiceFactory, WebhookSender};
use tripguard::utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard must outlive the daemon.
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting TripGuard lifecycle daemon...");

    // Initialize database connection
    info!("Connecting to database...");
    let pool_config = connection::PoolConfig {
        url: settings.database.url.clone(),
        max_connections: settings.database.max_connections,
        min_connections: settings.database.min_connections,
        acquire_timeout: Duration::from_secs(30),
        idle_timeout: Some(Duration::from_secs(600)),
        max_lifetime: Some(Duration::from_secs(1800)),
    };
    let pool = connection::create_pool(&pool_config).await?;

    // Run database migrations
    connection::run_migrations(&pool).await?;

    let db = DatabaseService::new(pool);

    // Notification dispatch: bounded queue drained by worker tasks
    info!("Starting notification dispatch workers...");
    let sender = Arc::new(WebhookSender::new(&settings.notifications)?);
    let (dispatcher, worker_handles) = Dispatcher::spawn(sender, &settings.notifications);

    // Request-facing services (exposed to the API layer via the library)
    let services = ServiceFactory::new(db.clone(), dispatcher);

    // Lifecycle scheduler
    let scheduler = LifecycleScheduler::new(
        db,
        services.notifications.clone(),
        &settings.scheduler,
    );
    let scheduler_handle = scheduler.start();

    info!("TripGuard is ready");

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // `stop` consumes the scheduler, releasing its dispatcher clone.
    scheduler.stop();
    scheduler_handle.await?;

    // Dropping the services drops the last dispatcher clones; workers exit
    // once the queue drains.
    drop(services);
    for handle in worker_handles {
        handle.await?;
    }

    info!("TripGuard has shut down");
    Ok(())
}
