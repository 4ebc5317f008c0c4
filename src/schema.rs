//! Database schema management for the telemetry history store.
//!
//! Ensures the history table and its index exist before serving requests.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create the schema if missing (idempotent).
///
/// `sensor_readings` holds every ingested reading; the composite
/// `(node_id, ts)` index serves the per-node, time-ordered history scans of
/// the aggregation stage. Safe to call on every startup.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id          BIGSERIAL PRIMARY KEY,
            ts          TIMESTAMPTZ      NOT NULL,
            node_id     VARCHAR(64)      NOT NULL,
            latency_ms  DOUBLE PRECISION NOT NULL CHECK (latency_ms >= 0),
            jitter_ms   DOUBLE PRECISION NOT NULL CHECK (jitter_ms >= 0),
            rssi_dbm    DOUBLE PRECISION NOT NULL,
            noise_dbm   DOUBLE PRECISION NOT NULL,
            failure     BOOLEAN
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS ix_sensor_readings_node_ts
            ON sensor_readings (node_id, ts);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Database schema ready");
    Ok(())
}
