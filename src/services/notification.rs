//! Notification fan-out service
//!
//! Decides whom to notify for each lifecycle trigger, personalizes the
//! message per (recipient, watched person) pair, and hands the result to
//! the dispatcher. Never waits for delivery.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::database::DatabaseService;
use crate::models::contact::Contact;
use crate::models::participant::Participant;
use crate::models::trip::{ReminderKind, Trip};
use crate::models::vote::VoteOutcome;
use crate::services::dispatch::{Dispatcher, NotificationJob, Recipient};
use crate::utils::errors::{Result, TripGuardError};

/// Message template structure
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub key: String,
    pub subject: String,
    pub body: String,
}

/// One personalized contact-alert target: a recipient watching a specific
/// person on the trip
#[derive(Debug, Clone)]
pub struct FanoutTarget {
    pub recipient: Recipient,
    pub watched_user_id: i64,
    pub watched_name: String,
}

/// Build the contact recipient set for a trip.
///
/// Solo trip: the owner's contacts, watching the owner. Group trip: every
/// currently-accepted participant's contacts, each watching that
/// participant. Deduplication is by (recipient, watched person), never by
/// address alone: a contact watching two people gets two separately
/// personalized notifications.
pub fn build_contact_fanout(
    participants: &[Participant],
    contacts: &[Contact],
) -> Vec<FanoutTarget> {
    let mut contacts_by_user: HashMap<i64, Vec<&Contact>> = HashMap::new();
    for contact in contacts {
        contacts_by_user.entry(contact.user_id).or_default().push(contact);
    }

    let mut seen: HashSet<(String, String, i64)> = HashSet::new();
    let mut targets = Vec::new();

    for participant in participants.iter().filter(|p| p.is_accepted()) {
        let Some(user_contacts) = contacts_by_user.get(&participant.user_id) else {
            continue;
        };
        for contact in user_contacts {
            let key = (
                contact.channel.clone(),
                contact.address.clone(),
                participant.user_id,
            );
            if !seen.insert(key) {
                continue;
            }
            let Some(channel) = crate::models::contact::ContactChannel::parse(&contact.channel)
            else {
                continue;
            };
            targets.push(FanoutTarget {
                recipient: Recipient::Contact {
                    channel,
                    address: contact.address.clone(),
                },
                watched_user_id: participant.user_id,
                watched_name: participant.display_name.clone(),
            });
        }
    }

    targets
}

/// Notification service for trip lifecycle triggers
#[derive(Clone)]
pub struct NotificationService {
    db: DatabaseService,
    dispatcher: Dispatcher,
    templates: HashMap<String, MessageTemplate>,
}

impl NotificationService {
    pub fn new(db: DatabaseService, dispatcher: Dispatcher) -> Self {
        Self {
            db,
            dispatcher,
            templates: Self::load_default_templates(),
        }
    }

    /// Alert every configured contact that a watched person is overdue
    pub async fn notify_trip_overdue(&self, trip: &Trip) -> Result<usize> {
        let targets = self.contact_targets(trip).await?;
        let mut enqueued = 0;

        for target in &targets {
            let mut params = self.trip_params(trip);
            params.insert("person".to_string(), target.watched_name.clone());
            let (subject, body) = self.format_message("overdue_alert", &params)?;

            if self.enqueue(trip, "overdue_alert", target.recipient.clone(), subject, body) {
                enqueued += 1;
            }
        }

        info!(trip_id = %trip.id, recipients = enqueued, "Overdue alert fan-out scheduled");
        Ok(enqueued)
    }

    /// Tell contacts the watched person checked out safely
    pub async fn notify_trip_safe(&self, trip: &Trip) -> Result<usize> {
        let targets = self.contact_targets(trip).await?;
        let mut enqueued = 0;

        for target in &targets {
            let mut params = self.trip_params(trip);
            params.insert("person".to_string(), target.watched_name.clone());
            let (subject, body) = self.format_message("safe", &params)?;

            if self.enqueue(trip, "safe", target.recipient.clone(), subject, body) {
                enqueued += 1;
            }
        }

        info!(trip_id = %trip.id, recipients = enqueued, "Safe-checkout fan-out scheduled");
        Ok(enqueued)
    }

    /// Tell the other accepted participants a checkout vote was recorded
    pub async fn notify_vote_progress(
        &self,
        trip: &Trip,
        voter_user_id: i64,
        voter_name: &str,
        outcome: &VoteOutcome,
    ) -> Result<usize> {
        let participants = self.db.participants.list_accepted(trip.id).await?;
        let mut params = self.trip_params(trip);
        params.insert("voter".to_string(), voter_name.to_string());
        params.insert("votes_cast".to_string(), outcome.votes_cast.to_string());
        params.insert("votes_needed".to_string(), outcome.votes_needed.to_string());
        let (subject, body) = self.format_message("vote_progress", &params)?;

        let mut enqueued = 0;
        for participant in participants.iter().filter(|p| p.user_id != voter_user_id) {
            let recipient = Recipient::User {
                user_id: participant.user_id,
            };
            if self.enqueue(trip, "vote_progress", recipient, subject.clone(), body.clone()) {
                enqueued += 1;
            }
        }

        Ok(enqueued)
    }

    /// Tell an invited user about the trip
    pub fn notify_invite(&self, trip: &Trip, invitee_user_id: i64, inviter_name: &str) -> Result<()> {
        let mut params = self.trip_params(trip);
        params.insert("inviter".to_string(), inviter_name.to_string());
        let (subject, body) = self.format_message("invite", &params)?;

        self.enqueue(
            trip,
            "invite",
            Recipient::User {
                user_id: invitee_user_id,
            },
            subject,
            body,
        );
        Ok(())
    }

    /// Push a reminder to every accepted participant on the trip
    pub async fn send_reminder(&self, trip: &Trip, kind: ReminderKind) -> Result<usize> {
        let participants = self.db.participants.list_accepted(trip.id).await?;
        let params = self.trip_params(trip);
        let (subject, body) = self.format_message(kind.as_str(), &params)?;

        let mut enqueued = 0;
        for participant in &participants {
            let recipient = Recipient::User {
                user_id: participant.user_id,
            };
            if self.enqueue(trip, kind.as_str(), recipient, subject.clone(), body.clone()) {
                enqueued += 1;
            }
        }

        debug!(trip_id = %trip.id, reminder = %kind, recipients = enqueued, "Reminder scheduled");
        Ok(enqueued)
    }

    async fn contact_targets(&self, trip: &Trip) -> Result<Vec<FanoutTarget>> {
        let participants = self.db.participants.list_accepted(trip.id).await?;
        let user_ids: Vec<i64> = participants.iter().map(|p| p.user_id).collect();
        let contacts = self.db.contacts.list_for_users(&user_ids).await?;

        Ok(build_contact_fanout(&participants, &contacts))
    }

    fn enqueue(
        &self,
        trip: &Trip,
        trigger: &str,
        recipient: Recipient,
        subject: String,
        body: String,
    ) -> bool {
        self.dispatcher.enqueue(NotificationJob {
            trip_id: trip.id,
            trigger: trigger.to_string(),
            recipient,
            subject,
            body,
        })
    }

    fn trip_params(&self, trip: &Trip) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("activity".to_string(), trip.activity.clone());
        params.insert(
            "start".to_string(),
            trip.start_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        );
        params.insert(
            "eta".to_string(),
            trip.eta_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        );
        params.insert("grace".to_string(), trip.grace_minutes.to_string());
        params
    }

    /// Format message using template and parameters
    fn format_message(
        &self,
        template_key: &str,
        parameters: &HashMap<String, String>,
    ) -> Result<(String, String)> {
        let template = self.templates.get(template_key).ok_or_else(|| {
            TripGuardError::Validation(format!("Template not found: {}", template_key))
        })?;

        let mut subject = template.subject.clone();
        let mut body = template.body.clone();

        for (key, value) in parameters {
            let placeholder = format!("{{{}}}", key);
            subject = subject.replace(&placeholder, value);
            body = body.replace(&placeholder, value);
        }

        Ok((subject, body))
    }

    fn load_default_templates() -> HashMap<String, MessageTemplate> {
        let mut templates = HashMap::new();

        let mut add = |key: &str, subject: &str, body: &str| {
            templates.insert(
                key.to_string(),
                MessageTemplate {
                    key: key.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                },
            );
        };

        add(
            "overdue_alert",
            "{person} is overdue",
            "{person} has not checked in from \"{activity}\". Expected back by {eta} \
             (grace period {grace} minutes has elapsed). Please try to reach them.",
        );
        add(
            "safe",
            "{person} is safe",
            "{person} has checked out safely from \"{activity}\". No further action needed.",
        );
        add(
            "vote_progress",
            "Checkout vote for \"{activity}\"",
            "{voter} voted to end the trip. {votes_cast} of {votes_needed} votes so far.",
        );
        add(
            "invite",
            "Trip invitation: \"{activity}\"",
            "{inviter} invited you to join \"{activity}\" starting {start}, back by {eta}.",
        );
        add(
            "starting_soon",
            "\"{activity}\" starts soon",
            "Your trip \"{activity}\" starts at {start}.",
        );
        add(
            "started",
            "\"{activity}\" has started",
            "Your trip \"{activity}\" is now active. Expected back by {eta}.",
        );
        add(
            "approaching_eta",
            "\"{activity}\" ETA approaching",
            "You are expected back by {eta}. Check in or extend if you need more time.",
        );
        add(
            "eta_reached",
            "\"{activity}\" ETA reached",
            "Your ETA {eta} has passed. Check in, check out, or extend within {grace} minutes \
             or your emergency contacts will be alerted.",
        );
        add(
            "checkin_reminder",
            "Check-in reminder",
            "Reminder to check in for \"{activity}\". Expected back by {eta}.",
        );
        add(
            "grace_warning",
            "Grace period running out",
            "Your ETA {eta} has passed. Emergency contacts will be alerted when the \
             {grace}-minute grace period ends.",
        );

        templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contact::ContactChannel;
    use chrono::Utc;
    use uuid::Uuid;

    fn participant(trip_id: Uuid, user_id: i64, name: &str, status: &str) -> Participant {
        Participant {
            id: user_id,
            trip_id,
            user_id,
            display_name: name.to_string(),
            role: if user_id == 1 { "owner" } else { "participant" }.to_string(),
            status: status.to_string(),
            invited_by: None,
            invited_at: Utc::now(),
            joined_at: Some(Utc::now()),
            left_at: None,
            last_checkin_at: None,
            last_lat: None,
            last_lon: None,
        }
    }

    fn contact(id: i64, user_id: i64, address: &str) -> Contact {
        Contact {
            id,
            user_id,
            name: format!("contact-{id}"),
            channel: "email".to_string(),
            address: address.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_solo_fanout_watches_the_owner() {
        let trip_id = Uuid::new_v4();
        let participants = vec![participant(trip_id, 1, "Alice", "accepted")];
        let contacts = vec![contact(1, 1, "mom@example.com"), contact(2, 1, "dad@example.com")];

        let targets = build_contact_fanout(&participants, &contacts);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.watched_user_id == 1));
        assert!(targets.iter().all(|t| t.watched_name == "Alice"));
    }

    #[test]
    fn test_group_fanout_watches_each_accepted_participant() {
        let trip_id = Uuid::new_v4();
        let participants = vec![
            participant(trip_id, 1, "Alice", "accepted"),
            participant(trip_id, 2, "Bob", "accepted"),
            participant(trip_id, 3, "Carol", "invited"),
        ];
        let contacts = vec![
            contact(1, 1, "mom@example.com"),
            contact(2, 2, "bobs-friend@example.com"),
            contact(3, 3, "never@example.com"),
        ];

        let targets = build_contact_fanout(&participants, &contacts);
        // Carol is only invited: her contacts are not alerted.
        assert_eq!(targets.len(), 2);
        let watched: Vec<i64> = targets.iter().map(|t| t.watched_user_id).collect();
        assert!(watched.contains(&1));
        assert!(watched.contains(&2));
        assert!(!watched.contains(&3));
    }

    #[test]
    fn test_dedup_is_per_watched_person_not_per_address() {
        let trip_id = Uuid::new_v4();
        let participants = vec![
            participant(trip_id, 1, "Alice", "accepted"),
            participant(trip_id, 2, "Bob", "accepted"),
        ];
        // The same address watches both people, and Alice has it twice.
        let contacts = vec![
            contact(1, 1, "shared@example.com"),
            contact(2, 1, "shared@example.com"),
            contact(3, 2, "shared@example.com"),
        ];

        let targets = build_contact_fanout(&participants, &contacts);
        // Two distinct (recipient, watched) pairs, not one and not three.
        assert_eq!(targets.len(), 2);
        let names: Vec<&str> = targets.iter().map(|t| t.watched_name.as_str()).collect();
        assert!(names.contains(&"Alice"));
        assert!(names.contains(&"Bob"));
    }

    #[test]
    fn test_template_formatting() {
        let templates = NotificationService::load_default_templates();
        let template = templates.get("overdue_alert").unwrap();

        let mut subject = template.subject.clone();
        let mut body = template.body.clone();
        for (key, value) in [
            ("person", "Alice"),
            ("activity", "Night hike"),
            ("eta", "2026-08-26 18:00 UTC"),
            ("grace", "30"),
        ] {
            let placeholder = format!("{{{}}}", key);
            subject = subject.replace(&placeholder, value);
            body = body.replace(&placeholder, value);
        }

        assert_eq!(subject, "Alice is overdue");
        assert!(body.contains("Night hike"));
        assert!(body.contains("30"));
        assert!(!body.contains('{'));
    }

    #[test]
    fn test_every_trigger_has_a_template() {
        let templates = NotificationService::load_default_templates();
        for key in [
            "overdue_alert",
            "safe",
            "vote_progress",
            "invite",
            "starting_soon",
            "started",
            "approaching_eta",
            "eta_reached",
            "checkin_reminder",
            "grace_warning",
        ] {
            assert!(templates.contains_key(key), "missing template: {key}");
        }
        for kind in ReminderKind::ALL {
            assert!(templates.contains_key(kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_channel_is_skipped() {
        let trip_id = Uuid::new_v4();
        let participants = vec![participant(trip_id, 1, "Alice", "accepted")];
        let mut bad = contact(1, 1, "x@example.com");
        bad.channel = "carrier_pigeon".to_string();

        let targets = build_contact_fanout(&participants, &[bad]);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_recipient_serialization_shape() {
        let recipient = Recipient::Contact {
            channel: ContactChannel::Sms,
            address: "+15551234".to_string(),
        };
        let value = serde_json::to_value(&recipient).unwrap();
        assert_eq!(value["type"], "contact");
        assert_eq!(value["channel"], "sms");
    }
}
