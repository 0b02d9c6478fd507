//! Database schema management for `arus-logger`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `store::connect` (single gateway call).

use anyhow::Result;
use sqlx::PgPool;

use crate::Partition;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates one log table per [`Partition`] and the `indicator` table holding
/// the last known state of each device. Safe to call on every startup; no-op
/// if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    for partition in Partition::ALL {
        let table = partition.table_name();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id           BIGSERIAL PRIMARY KEY,
                batch_id     UUID             NOT NULL,
                sample       BIGINT           NOT NULL,
                i            DOUBLE PRECISION NOT NULL,
                captured_at  TIMESTAMPTZ      NOT NULL,
                indicator_id INTEGER
            );
            "#
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_batch_id ON {table} (batch_id);"
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_indicator_captured ON {table} (indicator_id, captured_at);"
        ))
        .execute(&mut *tx)
        .await?;
    }

    // Last-write-wins device state
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indicator (
            indicator_id INTEGER          PRIMARY KEY,
            i            DOUBLE PRECISION NOT NULL,
            motor        TEXT,
            updated_at   TIMESTAMPTZ      NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Schema ready ({} log tables)", Partition::ALL.len());
    Ok(())
}
