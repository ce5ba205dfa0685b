pub mod accounts;
pub mod inventory;
pub mod listing;
pub mod memory;
pub mod pricing;

pub use accounts::{new_user, revise_user};
pub use inventory::{Availability, EventLocks};
pub use listing::{new_event, revise_event};
pub use memory::InMemoryStore;
pub use pricing::quote;
