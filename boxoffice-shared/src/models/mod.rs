pub mod booking;
pub mod event;
pub mod payment;
pub mod user;
