//! Emergency contact model
//!
//! Contact CRUD lives outside this engine; the fan-out only ever reads the
//! roster, so the model stays minimal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Push,
    Email,
    Sms,
}

impl ContactChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactChannel::Push => "push",
            ContactChannel::Email => "email",
            ContactChannel::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<ContactChannel> {
        match s {
            "push" => Some(ContactChannel::Push),
            "email" => Some(ContactChannel::Email),
            "sms" => Some(ContactChannel::Sms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub channel: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContactRequest {
    pub user_id: i64,
    pub name: String,
    pub channel: ContactChannel,
    pub address: String,
}
