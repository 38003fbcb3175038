use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::{NewTicketType, TicketType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub venue: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    /// Hard ceiling on the sum of the event's ticket-type totals.
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}

/// An event together with its ticket types, as returned by catalog reads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    pub venue: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub capacity: i32,
    #[serde(default)]
    pub ticket_types: Vec<NewTicketType>,
}

/// Metadata changes for an existing event. Ticket types are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    pub name: Option<String>,
    pub venue: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
}

impl Event {
    pub fn apply(&mut self, update: EventUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(venue) = update.venue {
            self.venue = venue;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(event_date) = update.event_date {
            self.event_date = event_date;
        }
        if let Some(capacity) = update.capacity {
            self.capacity = capacity;
        }
    }
}
