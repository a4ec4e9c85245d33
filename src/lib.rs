//! TripGuard safety-trip lifecycle engine
//!
//! Tracks declared activities with a start time, an expected-return time
//! and a grace window. A periodic scheduler detects time-based transitions
//! and fans out notifications to emergency contacts exactly once per
//! trigger; group trips check out through a concurrency-safe quorum vote.

pub mod config;
pub mod database;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{Result, TripGuardError};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::{LifecycleScheduler, ServiceFactory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
