use async_trait::async_trait;
use boxoffice_catalog::Availability;
use boxoffice_core::repository::EventRepository;
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::{Event, EventStatistics};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store_error;

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    description: String,
    date_time: DateTime<Utc>,
    total_tickets: i32,
    ticket_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            name: row.name,
            description: row.description,
            date_time: row.date_time,
            total_tickets: row.total_tickets,
            ticket_price: row.ticket_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    total_tickets: i32,
    pending: i64,
    confirmed: i64,
    confirmed_revenue: Decimal,
}

const EVENT_COLUMNS: &str =
    "id, name, description, date_time, total_tickets, ticket_price, created_at, updated_at";

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn create_event(&self, event: &Event) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, name, description, date_time, total_tickets, ticket_price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date_time)
        .bind(event.total_tickets)
        .bind(event.ticket_price)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(Event::from))
    }

    async fn list_events(&self) -> CoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {} FROM events ORDER BY date_time ASC",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn update_event(&self, event: &Event) -> CoreResult<()> {
        // total_tickets is not in the SET list
        let result = sqlx::query(
            r#"
            UPDATE events
            SET name = $1, description = $2, date_time = $3, ticket_price = $4, updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date_time)
        .bind(event.ticket_price)
        .bind(event.updated_at)
        .bind(event.id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::EventNotFound(event.id));
        }
        Ok(())
    }

    async fn event_statistics(&self, id: Uuid) -> CoreResult<Option<EventStatistics>> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT
                e.total_tickets,
                COALESCE(SUM(b.quantity) FILTER (WHERE b.status = 'PENDING'), 0)::BIGINT AS pending,
                COALESCE(SUM(b.quantity) FILTER (WHERE b.status = 'CONFIRMED'), 0)::BIGINT AS confirmed,
                COALESCE(SUM(b.total_amount) FILTER (WHERE b.status = 'CONFIRMED'), 0) AS confirmed_revenue
            FROM events e
            LEFT JOIN bookings b ON b.event_id = e.id
            WHERE e.id = $1
            GROUP BY e.id, e.total_tickets
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row.map(|row| {
            let availability = Availability {
                total_tickets: row.total_tickets,
                pending: row.pending,
                confirmed: row.confirmed,
            };
            EventStatistics {
                event_id: id,
                total_tickets: row.total_tickets,
                confirmed_tickets: availability.confirmed,
                pending_tickets: availability.pending,
                available_tickets: availability.available(),
                confirmed_revenue: row.confirmed_revenue,
            }
        }))
    }
}
