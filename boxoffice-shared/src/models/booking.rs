use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    /// Pending and Confirmed bookings both count against event capacity.
    pub fn holds_inventory(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// Only `Pending -> Confirmed` and `Pending -> Cancelled` exist.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown booking status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A user's claim on `quantity` tickets of one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub quantity: i32,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A fresh reservation. Always starts Pending with a deadline.
    pub fn pending(
        user_id: Uuid,
        event_id: Uuid,
        quantity: i32,
        total_amount: Decimal,
        payment_deadline: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            quantity,
            status: BookingStatus::Pending,
            total_amount,
            payment_deadline: Some(payment_deadline),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`. The deadline only exists while Pending.
    pub fn update_status(&mut self, next: BookingStatus) {
        self.status = next;
        if next.is_terminal() {
            self.payment_deadline = None;
        }
        self.updated_at = Utc::now();
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending
            && self.payment_deadline.is_some_and(|deadline| deadline < now)
    }
}

/// Wire shape of a booking request. Identifiers stay strings here so the
/// API can report malformed ones as invalid input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: String,
    pub event_id: String,
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [BookingStatus::Pending, BookingStatus::Confirmed, BookingStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("EXPIRED".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_only_pending_can_move() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_terminal_status_clears_deadline() {
        let mut booking = Booking::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            2,
            Decimal::new(4000, 2),
            Utc::now() + Duration::minutes(15),
        );
        assert!(booking.payment_deadline.is_some());

        booking.update_status(BookingStatus::Confirmed);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.payment_deadline.is_none());
    }

    #[test]
    fn test_expiry_only_applies_to_pending() {
        let now = Utc::now();
        let mut booking = Booking::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            1,
            Decimal::ONE,
            now - Duration::seconds(1),
        );
        assert!(booking.is_expired_at(now));

        booking.update_status(BookingStatus::Cancelled);
        assert!(!booking.is_expired_at(now));
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&BookingStatus::Confirmed).unwrap();
        assert_eq!(json, "\"CONFIRMED\"");
    }
}
