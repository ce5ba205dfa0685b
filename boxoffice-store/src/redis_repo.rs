use async_trait::async_trait;
use boxoffice_core::queue::{PaymentQueue, QueueDepth, QueuedJob};
use boxoffice_core::{CoreError, CoreResult};
use boxoffice_shared::PaymentJob;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Reliable FIFO on Redis lists.
///
/// Producers `LPUSH` onto `<key>`; consumers atomically `BLMOVE` the oldest
/// entry into `<key>:processing`, so a job claimed by a worker that dies is
/// still in Redis and is moved back by [`PaymentQueue::requeue_unacked`].
/// Jobs that cannot be settled land in `<key>:dead`.
#[derive(Clone)]
pub struct RedisPaymentQueue {
    client: redis::Client,
    queue_key: String,
    processing_key: String,
    dead_key: String,
    /// Server-side wait of each `BLMOVE` round.
    block_timeout_secs: f64,
}

/// Entry of the dead-letter list.
#[derive(Debug, Serialize, Deserialize)]
struct DeadLetterEntry {
    payload: String,
    reason: String,
    failed_at: chrono::DateTime<chrono::Utc>,
}

fn queue_error(err: redis::RedisError) -> CoreError {
    CoreError::QueueUnavailable(err.to_string())
}

impl RedisPaymentQueue {
    pub async fn new(connection_string: &str, queue_key: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail fast on a bad URL or unreachable server.
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        info!(queue = queue_key, "Connected to payment queue");

        Ok(Self {
            client,
            queue_key: queue_key.to_string(),
            processing_key: format!("{}:processing", queue_key),
            dead_key: format!("{}:dead", queue_key),
            block_timeout_secs: 0.2,
        })
    }

    async fn connection(&self) -> CoreResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(queue_error)
    }

    async fn park_raw(
        &self,
        conn: &mut MultiplexedConnection,
        payload: &str,
        reason: &str,
    ) -> CoreResult<()> {
        let entry = DeadLetterEntry {
            payload: payload.to_string(),
            reason: reason.to_string(),
            failed_at: chrono::Utc::now(),
        };
        let entry = serde_json::to_string(&entry)
            .map_err(|e| CoreError::QueueUnavailable(format!("encode dead letter: {}", e)))?;

        redis::pipe()
            .atomic()
            .lrem(&self.processing_key, 1, payload)
            .ignore()
            .lpush(&self.dead_key, entry)
            .ignore()
            .query_async::<()>(conn)
            .await
            .map_err(queue_error)
    }
}

#[async_trait]
impl PaymentQueue for RedisPaymentQueue {
    async fn enqueue(&self, job: &PaymentJob) -> CoreResult<()> {
        let payload = serde_json::to_string(job)
            .map_err(|e| CoreError::QueueUnavailable(format!("encode payment job: {}", e)))?;
        let mut conn = self.connection().await?;
        conn.lpush::<_, _, ()>(&self.queue_key, payload)
            .await
            .map_err(queue_error)?;
        info!(booking_id = %job.booking_id, "Payment job enqueued");
        Ok(())
    }

    async fn dequeue(&self) -> CoreResult<QueuedJob> {
        let mut conn = self.connection().await?;
        loop {
            let claimed: Option<String> = redis::cmd("BLMOVE")
                .arg(&self.queue_key)
                .arg(&self.processing_key)
                .arg("RIGHT")
                .arg("LEFT")
                .arg(self.block_timeout_secs)
                .query_async(&mut conn)
                .await
                .map_err(queue_error)?;

            let Some(payload) = claimed else {
                continue;
            };

            match serde_json::from_str::<PaymentJob>(&payload) {
                // The raw payload doubles as the receipt: LREM finds it by value.
                Ok(job) => {
                    return Ok(QueuedJob {
                        job,
                        receipt: payload,
                    })
                }
                Err(e) => {
                    error!(error = %e, "Undecodable payment job, moving to dead letters");
                    self.park_raw(&mut conn, &payload, &format!("undecodable payload: {}", e))
                        .await?;
                }
            }
        }
    }

    async fn ack(&self, delivery: &QueuedJob) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn
            .lrem(&self.processing_key, 1, &delivery.receipt)
            .await
            .map_err(queue_error)?;
        if removed == 0 {
            warn!(booking_id = %delivery.job.booking_id, "Acked job was not in the processing list");
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &QueuedJob, reason: &str) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        self.park_raw(&mut conn, &delivery.receipt, reason).await
    }

    async fn requeue_unacked(&self) -> CoreResult<usize> {
        let mut conn = self.connection().await?;
        let mut recovered = 0;
        loop {
            // Newest claim first, so the oldest ends up at the consuming end.
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.queue_key)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await
                .map_err(queue_error)?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn has_job(&self, booking_id: Uuid) -> CoreResult<bool> {
        let mut conn = self.connection().await?;
        let (waiting, claimed): (Vec<String>, Vec<String>) = redis::pipe()
            .lrange(&self.queue_key, 0, -1)
            .lrange(&self.processing_key, 0, -1)
            .query_async(&mut conn)
            .await
            .map_err(queue_error)?;

        Ok(waiting.iter().chain(claimed.iter()).any(|payload| {
            serde_json::from_str::<PaymentJob>(payload)
                .map(|job| job.booking_id == booking_id)
                .unwrap_or(false)
        }))
    }

    async fn depth(&self) -> CoreResult<QueueDepth> {
        let mut conn = self.connection().await?;
        let (ready, in_flight, dead): (usize, usize, usize) = redis::pipe()
            .llen(&self.queue_key)
            .llen(&self.processing_key)
            .llen(&self.dead_key)
            .query_async(&mut conn)
            .await
            .map_err(queue_error)?;

        Ok(QueueDepth {
            ready,
            in_flight,
            dead,
        })
    }
}
