use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A ticketed event. `total_tickets` is the capacity ceiling and never
/// changes once the event exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub total_tickets: i32,
    pub ticket_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        name: String,
        description: String,
        date_time: DateTime<Utc>,
        total_tickets: i32,
        ticket_price: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            date_time,
            total_tickets,
            ticket_price,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bookings are only accepted while the event is still ahead of `now`.
    pub fn is_bookable_at(&self, now: DateTime<Utc>) -> bool {
        self.date_time > now
    }

    /// Apply a partial update. Capacity is not part of it.
    pub fn apply(&mut self, update: UpdateEventRequest) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(date_time) = update.date_time {
            self.date_time = date_time;
        }
        if let Some(price) = update.ticket_price {
            self.ticket_price = price;
        }
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub date_time: DateTime<Utc>,
    pub total_tickets: i32,
    pub ticket_price: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date_time: Option<DateTime<Utc>>,
    pub ticket_price: Option<Decimal>,
}

/// Sales figures derived from the current booking statuses of one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventStatistics {
    pub event_id: Uuid,
    pub total_tickets: i32,
    pub confirmed_tickets: i64,
    pub pending_tickets: i64,
    pub available_tickets: i64,
    pub confirmed_revenue: Decimal,
}
