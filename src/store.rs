//! History store collaborator.
//!
//! The pipeline never talks SQL directly: ingestion appends batches and the
//! aggregation stage reads the full history back, both through
//! [`ReadingStore`]. [`PgStore`] is the production backend; [`MemoryStore`]
//! keeps everything in a vector for tests and embedded use.

use std::{
    future::Future,
    sync::{Mutex, PoisonError},
};

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::StoreError;
use crate::models::Reading;

// ---

pub trait ReadingStore: Send + Sync + 'static {
    /// Append a batch of validated readings; returns the number stored.
    fn insert_batch(
        &self,
        readings: &[Reading],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Every stored reading, in no particular order.
    fn load_history(&self) -> impl Future<Output = Result<Vec<Reading>, StoreError>> + Send;
}

/// Rows per multi-row INSERT statement.
const INSERT_CHUNK: usize = 1000;

/// PostgreSQL-backed store over the `sensor_readings` table.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

impl ReadingStore for PgStore {
    async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, StoreError> {
        // ---
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        // Postgres caps a statement at 65535 bind parameters
        for chunk in readings.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO sensor_readings \
                 (ts, node_id, latency_ms, jitter_ms, rssi_dbm, noise_dbm, failure) ",
            );
            builder.push_values(chunk, |mut row, r| {
                row.push_bind(r.timestamp)
                    .push_bind(r.node_id.clone())
                    .push_bind(r.latency_ms)
                    .push_bind(r.jitter_ms)
                    .push_bind(r.rssi_dbm)
                    .push_bind(r.noise_dbm)
                    .push_bind(r.failure);
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        tracing::debug!("Stored {} readings", inserted);
        Ok(inserted)
    }

    async fn load_history(&self) -> Result<Vec<Reading>, StoreError> {
        // ---
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT node_id, ts, latency_ms, jitter_ms, rssi_dbm, noise_dbm, failure
            FROM sensor_readings
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::info!("Loaded {} historical readings", readings.len());
        Ok(readings)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: Mutex<Vec<Reading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingStore for MemoryStore {
    async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, StoreError> {
        // ---
        let mut stored = self.readings.lock().unwrap_or_else(PoisonError::into_inner);
        stored.extend_from_slice(readings);
        Ok(readings.len() as u64)
    }

    async fn load_history(&self) -> Result<Vec<Reading>, StoreError> {
        Ok(self
            .readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{TimeZone, Utc};

    fn create_test_reading(node: &str) -> Reading {
        // ---
        Reading {
            node_id: node.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap(),
            latency_ms: 20.0,
            jitter_ms: 3.0,
            rssi_dbm: -65.0,
            noise_dbm: -90.0,
            failure: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        // ---
        let store = MemoryStore::new();
        assert!(store.is_empty());

        let inserted = store
            .insert_batch(&[create_test_reading("node-01"), create_test_reading("node-02")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let history = store.load_history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].node_id, "node-02");
    }
}
