//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod contact;
pub mod event;
pub mod participant;
pub mod trip;
pub mod vote;

// Re-export repositories
pub use contact::ContactRepository;
pub use event::EventRepository;
pub use participant::ParticipantRepository;
pub use trip::TripRepository;
pub use vote::VoteRepository;
