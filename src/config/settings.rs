//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Lifecycle scheduler configuration
///
/// All intervals are in seconds, reminder leads and cadences in minutes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub tick_seconds: u64,
    pub starting_soon_lead_minutes: i64,
    pub approaching_eta_lead_minutes: i64,
    pub checkin_reminder_minutes: i64,
    pub grace_warning_minutes: i64,
}

/// Notification dispatch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Gateway endpoint that relays messages to push/email/SMS providers
    pub gateway_url: String,
    pub timeout_seconds: u64,
    pub queue_capacity: usize,
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("TRIPGUARD").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::TripGuardError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/tripguard".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            scheduler: SchedulerConfig {
                tick_seconds: 12,
                starting_soon_lead_minutes: 15,
                approaching_eta_lead_minutes: 15,
                checkin_reminder_minutes: 30,
                grace_warning_minutes: 5,
            },
            notifications: NotificationConfig {
                gateway_url: "http://localhost:8900/notify".to_string(),
                timeout_seconds: 5,
                queue_capacity: 1024,
                workers: 2,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/tripguard".to_string(),
            },
        }
    }
}
