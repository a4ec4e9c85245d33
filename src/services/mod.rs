//! Services module
//!
//! This module contains the lifecycle engine's business logic services

pub mod dispatch;
pub mod notification;
pub mod quorum;
pub mod scheduler;
pub mod trip;

// Re-export commonly used services
pub use dispatch::{Dispatcher, NotificationJob, NotificationSender, Recipient, WebhookSender};
pub use notification::{build_contact_fanout, FanoutTarget, MessageTemplate, NotificationService};
pub use quorum::QuorumService;
pub use scheduler::LifecycleScheduler;
pub use trip::TripService;

use crate::database::DatabaseService;

/// Service factory bundling the request-facing services behind one handle
#[derive(Clone)]
pub struct ServiceFactory {
    pub trips: TripService,
    pub quorum: QuorumService,
    pub notifications: NotificationService,
}

impl ServiceFactory {
    pub fn new(db: DatabaseService, dispatcher: Dispatcher) -> Self {
        let notifications = NotificationService::new(db.clone(), dispatcher);
        let trips = TripService::new(db.clone(), notifications.clone());
        let quorum = QuorumService::new(db, notifications.clone());

        Self {
            trips,
            quorum,
            notifications,
        }
    }
}
