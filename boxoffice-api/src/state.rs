use boxoffice_booking::BookingService;
use boxoffice_core::repository::{EventRepository, UserRepository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub events: Arc<dyn EventRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    pub fn new(
        bookings: Arc<BookingService>,
        events: Arc<dyn EventRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            bookings,
            events,
            users,
        }
    }
}
