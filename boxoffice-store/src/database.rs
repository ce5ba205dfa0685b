use boxoffice_core::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Map a driver error onto the domain taxonomy.
///
/// Data exceptions (SQLSTATE class 22) and integrity violations (class 23)
/// are deterministic: retrying the same statement fails the same way, so
/// they surface as invalid input. Everything else is treated as transient.
pub(crate) fn store_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(rejected) = db.code().and_then(|code| rejected_input(&code, db.message())) {
            return rejected;
        }
    }
    CoreError::TransientStoreFailure(err.to_string())
}

/// Unique violation (23505).
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn rejected_input(code: &str, message: &str) -> Option<CoreError> {
    if code.starts_with("22") || code.starts_with("23") {
        Some(CoreError::InvalidInput(format!("rejected by store ({}): {}", code, message)))
    } else {
        None
    }
}
