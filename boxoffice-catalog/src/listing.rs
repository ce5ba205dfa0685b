use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{CreateEventRequest, Event, UpdateEventRequest};
use rust_decimal::Decimal;

use crate::pricing::check_amount;

fn check_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidInput("event name must not be empty".to_string()));
    }
    Ok(())
}

fn check_price(price: Decimal) -> CoreResult<()> {
    check_amount("ticket_price", price)
}

/// Validate a creation request and build the event.
pub fn new_event(req: CreateEventRequest) -> CoreResult<Event> {
    check_name(&req.name)?;
    check_price(req.ticket_price)?;
    if req.total_tickets < 0 {
        return Err(CoreError::InvalidInput(format!(
            "total_tickets must not be negative, got {}",
            req.total_tickets
        )));
    }

    Ok(Event::new(
        req.name.trim().to_string(),
        req.description,
        req.date_time,
        req.total_tickets,
        req.ticket_price,
    ))
}

/// Apply a partial update after validating the fields it touches.
/// Existing bookings keep the amount they were quoted.
pub fn revise_event(mut event: Event, update: UpdateEventRequest) -> CoreResult<Event> {
    if let Some(name) = &update.name {
        check_name(name)?;
    }
    if let Some(price) = update.ticket_price {
        check_price(price)?;
    }

    event.apply(update);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn request() -> CreateEventRequest {
        CreateEventRequest {
            name: "  Chamber Music  ".to_string(),
            description: String::new(),
            date_time: Utc::now() + Duration::days(10),
            total_tickets: 120,
            ticket_price: Decimal::new(3500, 2),
        }
    }

    #[test]
    fn test_new_event_trims_name() {
        let event = new_event(request()).unwrap();
        assert_eq!(event.name, "Chamber Music");
        assert_eq!(event.total_tickets, 120);
    }

    #[test]
    fn test_new_event_rejects_bad_values() {
        let mut req = request();
        req.total_tickets = -1;
        assert!(matches!(new_event(req), Err(CoreError::InvalidInput(_))));

        let mut req = request();
        req.ticket_price = Decimal::new(-1, 0);
        assert!(matches!(new_event(req), Err(CoreError::InvalidInput(_))));

        let mut req = request();
        req.name = "   ".to_string();
        assert!(matches!(new_event(req), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_price_must_fit_storage() {
        let mut req = request();
        req.ticket_price = Decimal::new(100_000_000_000, 0);
        assert!(matches!(new_event(req), Err(CoreError::InvalidInput(_))));

        let mut req = request();
        req.ticket_price = Decimal::new(19999, 3);
        assert!(matches!(new_event(req), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_capacity_and_free_events_are_allowed() {
        let mut req = request();
        req.total_tickets = 0;
        req.ticket_price = Decimal::ZERO;
        assert!(new_event(req).is_ok());
    }

    #[test]
    fn test_revise_keeps_capacity() {
        let event = new_event(request()).unwrap();
        let revised = revise_event(
            event.clone(),
            UpdateEventRequest {
                ticket_price: Some(Decimal::new(5000, 2)),
                ..UpdateEventRequest::default()
            },
        )
        .unwrap();

        assert_eq!(revised.ticket_price, Decimal::new(5000, 2));
        assert_eq!(revised.total_tickets, event.total_tickets);
        assert_eq!(revised.name, event.name);
    }

    #[test]
    fn test_revise_rejects_empty_name() {
        let event = new_event(request()).unwrap();
        let result = revise_event(
            event,
            UpdateEventRequest {
                name: Some(String::new()),
                ..UpdateEventRequest::default()
            },
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }
}
