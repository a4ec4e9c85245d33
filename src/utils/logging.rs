//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging
//! utilities for the TripGuard engine.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::utils::errors::Result;

/// Initialize logging based on configuration.
///
/// Returns the appender guard; the caller must keep it alive for the
/// lifetime of the process or buffered log lines are lost on shutdown.
pub fn init_logging(config: &LoggingConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "tripguard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log user-driven trip actions with structured data
pub fn log_trip_action(trip_id: uuid::Uuid, user_id: i64, action: &str, details: Option<&str>) {
    info!(
        trip_id = %trip_id,
        user_id = user_id,
        action = action,
        details = details,
        "Trip action performed"
    );
}

/// Log a lifecycle transition applied by the scheduler or a handler
pub fn log_transition(trip_id: uuid::Uuid, from: &str, to: &str, trigger: &str) {
    info!(
        trip_id = %trip_id,
        from = from,
        to = to,
        trigger = trigger,
        "Trip status transition"
    );
}
