//! Notification dispatch
//!
//! A bounded work queue between the components that decide *whom* to notify
//! and the sender capability that knows *how* a channel transmits. Triggers
//! enqueue and return immediately; worker tasks drain the queue and deliver.
//! Delivery failure is logged, never retried, and never rolls back the
//! state transition that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::models::contact::ContactChannel;
use crate::utils::errors::{Result, TripGuardError};

/// Where a notification goes: a participant's own device, or an emergency
/// contact address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    User { user_id: i64 },
    Contact { channel: ContactChannel, address: String },
}

/// One unit of work on the dispatch queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub trip_id: Uuid,
    pub trigger: String,
    pub recipient: Recipient,
    pub subject: String,
    pub body: String,
}

/// Opaque sender capability: push, email and SMS uniformly.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, recipient: &Recipient, subject: &str, body: &str) -> Result<()>;
}

/// Handle for enqueueing notification jobs. Cheap to clone; the queue and
/// workers are shared.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<NotificationJob>,
}

impl Dispatcher {
    /// Create the queue and spawn the worker tasks. The returned handles
    /// complete once every `Dispatcher` clone is dropped and the queue
    /// drains.
    pub fn spawn(
        sender: Arc<dyn NotificationSender>,
        config: &NotificationConfig,
    ) -> (Self, Vec<JoinHandle<()>>) {
        Self::spawn_with(sender, config.queue_capacity, config.workers)
    }

    fn spawn_with(
        sender: Arc<dyn NotificationSender>,
        capacity: usize,
        workers: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel::<NotificationJob>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let sender = Arc::clone(&sender);
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        let Some(job) = job else { break };
                        deliver(worker_id, sender.as_ref(), job).await;
                    }
                    debug!(worker_id = worker_id, "Notification worker stopped");
                })
            })
            .collect();

        (Self { tx }, handles)
    }

    /// Enqueue a job without waiting. Returns whether the job was accepted;
    /// a full queue drops the job with a dead-letter log entry rather than
    /// blocking the triggering transition.
    pub fn enqueue(&self, job: NotificationJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    trip_id = %job.trip_id,
                    trigger = %job.trigger,
                    recipient = ?job.recipient,
                    "Notification queue full, job dropped (dead-letter)"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(
                    trip_id = %job.trip_id,
                    trigger = %job.trigger,
                    "Notification queue closed, job dropped"
                );
                false
            }
        }
    }
}

async fn deliver(worker_id: usize, sender: &dyn NotificationSender, job: NotificationJob) {
    match sender.send(&job.recipient, &job.subject, &job.body).await {
        Ok(()) => {
            info!(
                worker_id = worker_id,
                trip_id = %job.trip_id,
                trigger = %job.trigger,
                "Notification delivered"
            );
        }
        Err(e) => {
            // Not retried: delivery is at-most-once by design.
            warn!(
                worker_id = worker_id,
                trip_id = %job.trip_id,
                trigger = %job.trigger,
                recipient = ?job.recipient,
                error = %e,
                "Notification delivery failed (dead-letter)"
            );
        }
    }
}

/// Production sender: relays every job to an HTTP gateway that fans out to
/// the actual push/email/SMS providers.
#[derive(Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
    gateway_url: String,
}

impl WebhookSender {
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            gateway_url: config.gateway_url.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(&self, recipient: &Recipient, subject: &str, body: &str) -> Result<()> {
        let payload = serde_json::json!({
            "recipient": recipient,
            "subject": subject,
            "body": body,
        });

        let response = self
            .client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TripGuardError::NotificationFailed(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
