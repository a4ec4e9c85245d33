//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use super::Settings;
use crate::utils::errors::{Result, TripGuardError};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_scheduler_config(&settings.scheduler)?;
    validate_notification_config(&settings.notifications)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(TripGuardError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(TripGuardError::Config(
            "Max connections must be greater than 0".to_string(),
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(TripGuardError::Config(
            "Min connections cannot be greater than max connections".to_string(),
        ));
    }

    Ok(())
}

/// Validate scheduler configuration
fn validate_scheduler_config(config: &super::SchedulerConfig) -> Result<()> {
    if config.tick_seconds == 0 {
        return Err(TripGuardError::Config(
            "Scheduler tick interval must be greater than 0".to_string(),
        ));
    }

    // Reminders repeating faster than the tick can never fire on time.
    if config.checkin_reminder_minutes <= 0 || config.grace_warning_minutes <= 0 {
        return Err(TripGuardError::Config(
            "Reminder cadences must be greater than 0 minutes".to_string(),
        ));
    }

    if config.starting_soon_lead_minutes < 0 || config.approaching_eta_lead_minutes < 0 {
        return Err(TripGuardError::Config(
            "Reminder lead windows cannot be negative".to_string(),
        ));
    }

    Ok(())
}

/// Validate notification configuration
fn validate_notification_config(config: &super::NotificationConfig) -> Result<()> {
    if config.gateway_url.is_empty() {
        return Err(TripGuardError::Config(
            "Notification gateway URL is required".to_string(),
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(TripGuardError::Config(
            "Notification timeout must be greater than 0".to_string(),
        ));
    }

    if config.queue_capacity == 0 {
        return Err(TripGuardError::Config(
            "Notification queue capacity must be greater than 0".to_string(),
        ));
    }

    if config.workers == 0 {
        return Err(TripGuardError::Config(
            "At least one notification worker is required".to_string(),
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(TripGuardError::Config("Log level is required".to_string()));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(TripGuardError::Config(format!(
            "Invalid log level: {}. Valid levels: {:?}",
            config.level, valid_levels
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut settings = Settings::default();
        settings.scheduler.tick_seconds = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_empty_gateway_rejected() {
        let mut settings = Settings::default();
        settings.notifications.gateway_url = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_connection_bounds_rejected() {
        let mut settings = Settings::default();
        settings.database.min_connections = 20;
        settings.database.max_connections = 10;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }
}
