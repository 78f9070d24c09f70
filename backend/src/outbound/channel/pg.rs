//! PostgreSQL-backed verification channel.
//!
//! Messages live in the `channel_messages` table. `receive` leases the oldest
//! deliverable row with `FOR UPDATE SKIP LOCKED` and a visibility timeout, so
//! concurrent consumers never lease the same message and a crashed consumer's
//! lease expires back into the queue. `ack` deletes the row.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Binary, BigInt};
use diesel_async::RunQueryDsl;

use crate::domain::ports::{ChannelError, Delivery, DeliveryId, VerificationChannel};
use crate::outbound::persistence::schema::channel_messages;
use crate::outbound::persistence::{DbPool, PoolError};

const PROVISION_SQL: &str = "\
CREATE TABLE IF NOT EXISTS channel_messages (
    id BIGSERIAL PRIMARY KEY,
    payload BYTEA NOT NULL,
    locked_until TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

// The lease must outlive one reconcile attempt including the email send.
const LEASE_SQL: &str = "\
UPDATE channel_messages
SET locked_until = now() + interval '30 seconds'
WHERE id = (
    SELECT id FROM channel_messages
    WHERE locked_until IS NULL OR locked_until < now()
    ORDER BY id
    FOR UPDATE SKIP LOCKED
    LIMIT 1
)
RETURNING id, payload";

#[derive(Debug, QueryableByName)]
struct LeasedRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Binary)]
    payload: Vec<u8>,
}

fn map_pool_error(error: PoolError) -> ChannelError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ChannelError::unavailable(message)
        }
    }
}

/// Verification channel persisted in the service's own PostgreSQL database.
#[derive(Clone)]
pub struct PgChannel {
    pool: DbPool,
}

impl PgChannel {
    /// Create a channel over the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationChannel for PgChannel {
    async fn ensure_provisioned(&self) -> Result<(), ChannelError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(PROVISION_SQL)
            .execute(&mut conn)
            .await
            .map_err(|err| ChannelError::unavailable(err.to_string()))?;
        Ok(())
    }

    async fn publish(&self, payload: &[u8]) -> Result<(), ChannelError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(channel_messages::table)
            .values(channel_messages::payload.eq(payload))
            .execute(&mut conn)
            .await
            .map_err(|err| ChannelError::rejected(err.to_string()))?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, ChannelError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let leased: Option<LeasedRow> = sql_query(LEASE_SQL)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|err| ChannelError::unavailable(err.to_string()))?;
        Ok(leased.map(|row| Delivery {
            id: DeliveryId::new(row.id),
            payload: row.payload,
        }))
    }

    async fn ack(&self, id: DeliveryId) -> Result<(), ChannelError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(channel_messages::table.find(id.value()))
            .execute(&mut conn)
            .await
            .map_err(|err| ChannelError::rejected(err.to_string()))?;
        Ok(())
    }
}
