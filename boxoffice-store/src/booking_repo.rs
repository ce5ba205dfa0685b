use async_trait::async_trait;
use boxoffice_catalog::Availability;
use boxoffice_core::repository::BookingRepository;
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{Booking, BookingStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::database::store_error;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    event_id: Uuid,
    quantity: i32,
    status: String,
    total_amount: Decimal,
    payment_deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|e| CoreError::TransientStoreFailure(format!("booking {}: {}", row.id, e)))?;

        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            quantity: row.quantity,
            status,
            total_amount: row.total_amount,
            payment_deadline: row.payment_deadline,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReservedRow {
    pending: i64,
    confirmed: i64,
}

const BOOKING_COLUMNS: &str = "id, user_id, event_id, quantity, status, total_amount, payment_deadline, created_at, updated_at";

fn into_bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_with_reservation(&self, booking: &Booking) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // The event row lock serializes reservations per event.
        let total_tickets: Option<i32> =
            sqlx::query_scalar("SELECT total_tickets FROM events WHERE id = $1 FOR UPDATE")
                .bind(booking.event_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(store_error)?;
        let total_tickets = total_tickets.ok_or(CoreError::EventNotFound(booking.event_id))?;

        let reserved = sqlx::query_as::<_, ReservedRow>(
            r#"
            SELECT
                COALESCE(SUM(quantity) FILTER (WHERE status = 'PENDING'), 0)::BIGINT AS pending,
                COALESCE(SUM(quantity) FILTER (WHERE status = 'CONFIRMED'), 0)::BIGINT AS confirmed
            FROM bookings
            WHERE event_id = $1 AND status IN ('PENDING', 'CONFIRMED')
            "#,
        )
        .bind(booking.event_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        let availability = Availability {
            total_tickets,
            pending: reserved.pending,
            confirmed: reserved.confirmed,
        };
        // Dropping `tx` on the error path rolls back and releases the lock.
        availability.ensure(booking.quantity)?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, event_id, quantity, status, total_amount, payment_deadline, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.event_id)
        .bind(booking.quantity)
        .bind(booking.status.as_str())
        .bind(booking.total_amount)
        .bind(booking.payment_deadline)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        debug!(
            booking_id = %booking.id,
            event_id = %booking.event_id,
            remaining = availability.available() - i64::from(booking.quantity),
            "Reservation committed"
        );
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        into_bookings(rows)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> CoreResult<Booking> {
        let updated = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = $1,
                payment_deadline = CASE WHEN $1 = 'PENDING' THEN payment_deadline ELSE NULL END,
                updated_at = NOW()
            WHERE id = $2 AND status = $3
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        match updated {
            Some(row) => Booking::try_from(row),
            // Lost the race or never existed: report what is there now.
            None => match self.get_booking(id).await? {
                Some(current) => Err(CoreError::InvalidStateTransition {
                    from: current.status,
                    to,
                }),
                None => Err(CoreError::BookingNotFound(id)),
            },
        }
    }

    async fn list_pending(&self) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE status = 'PENDING' ORDER BY payment_deadline ASC",
            BOOKING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        into_bookings(rows)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        // Served by the (status, payment_deadline) index.
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE status = 'PENDING' AND payment_deadline < $1
            ORDER BY payment_deadline ASC
            "#,
            BOOKING_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        into_bookings(rows)
    }
}
