//! Data models module
//!
//! This module contains all data structures used throughout the engine.

pub mod contact;
pub mod event;
pub mod participant;
pub mod trip;
pub mod vote;

// Re-export commonly used models
pub use contact::{Contact, ContactChannel, CreateContactRequest};
pub use event::{EventKind, TripEvent};
pub use participant::{
    InviteParticipantRequest, Participant, ParticipantRole, ParticipantStatus,
};
pub use trip::{
    extended_eta, CheckoutMode, CreateTripRequest, GroupSettings, ReminderKind,
    ReminderSchedule, Trip, TripStatus,
};
pub use vote::{votes_needed, CheckoutVote, VoteOutcome};
