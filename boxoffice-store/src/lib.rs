pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod event_repo;
pub mod redis_repo;
pub mod user_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use event_repo::PgEventRepository;
pub use redis_repo::RedisPaymentQueue;
pub use user_repo::PgUserRepository;
