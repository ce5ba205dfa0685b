pub mod models;

pub use models::booking::{Booking, BookingStatus, CreateBookingRequest};
pub use models::event::{CreateEventRequest, Event, EventStatistics, UpdateEventRequest};
pub use models::payment::PaymentJob;
pub use models::user::{CreateUserRequest, UpdateUserRequest, User};
