//! PostgreSQL backend built on an sqlx connection pool.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Order, ReadingQuery, Store};
use crate::{Indicator, IndicatorUpdate, Partition, Reading};

// ---

/// Rows per INSERT statement; 5 binds each keeps us under the 65535 bind limit.
const INSERT_CHUNK: usize = 1000;

pub struct PgStore {
    pool: PgPool,
    /// Offset applied to timestamps read back from `TIMESTAMPTZ` columns.
    tz: FixedOffset,
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    batch_id: Uuid,
    sample: i64,
    i: f64,
    captured_at: DateTime<Utc>,
    indicator_id: Option<i32>,
}

#[derive(sqlx::FromRow)]
struct IndicatorRow {
    indicator_id: i32,
    i: f64,
    motor: Option<String>,
    updated_at: DateTime<Utc>,
}

impl ReadingRow {
    fn into_reading(self, tz: &FixedOffset) -> Reading {
        Reading {
            sample_index: self.sample,
            value: self.i,
            timestamp: self.captured_at.with_timezone(tz),
            batch_id: self.batch_id,
            device_id: self.indicator_id,
        }
    }
}

impl IndicatorRow {
    fn into_indicator(self, tz: &FixedOffset) -> Indicator {
        Indicator {
            device_id: self.indicator_id,
            last_value: self.i,
            label: self.motor,
            updated_at: self.updated_at.with_timezone(tz),
        }
    }
}

impl PgStore {
    pub fn new(pool: PgPool, tz: FixedOffset) -> Self {
        Self { pool, tz }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn bulk_insert(&self, partition: Partition, rows: &[Reading]) -> Result<u64> {
        // ---
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} (batch_id, sample, i, captured_at, indicator_id) ",
                partition.table_name()
            ));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.batch_id)
                    .push_bind(r.sample_index)
                    .push_bind(r.value)
                    .push_bind(r.timestamp)
                    .push_bind(r.device_id);
            });
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        tracing::debug!("Inserted {} rows into {}", written, partition.table_name());
        Ok(written)
    }

    async fn query(&self, partition: Partition, query: &ReadingQuery) -> Result<Vec<Reading>> {
        // ---
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT batch_id, sample, i, captured_at, indicator_id FROM {} WHERE TRUE",
            partition.table_name()
        ));

        if let Some(batch_id) = query.batch_id {
            qb.push(" AND batch_id = ").push_bind(batch_id);
        }
        if let Some(device_id) = query.device_id {
            qb.push(" AND indicator_id = ").push_bind(device_id);
        }
        if let Some(min_value) = query.min_value {
            qb.push(" AND i >= ").push_bind(min_value);
        }

        qb.push(match query.order {
            Order::Ascending => " ORDER BY captured_at ASC, id ASC",
            Order::Descending => " ORDER BY captured_at DESC, id DESC",
        });

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows: Vec<ReadingRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.into_reading(&self.tz)).collect())
    }

    async fn upsert_indicator(
        &self,
        update: &IndicatorUpdate,
        at: DateTime<FixedOffset>,
    ) -> Result<Indicator> {
        // ---
        let row: IndicatorRow = sqlx::query_as(
            r#"
            INSERT INTO indicator (indicator_id, i, motor, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (indicator_id) DO UPDATE SET
                i          = EXCLUDED.i,
                motor      = COALESCE(EXCLUDED.motor, indicator.motor),
                updated_at = EXCLUDED.updated_at
            RETURNING indicator_id, i, motor, updated_at
            "#,
        )
        .bind(update.device_id)
        .bind(update.value)
        .bind(&update.label)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_indicator(&self.tz))
    }

    async fn indicator(&self, device_id: i32) -> Result<Option<Indicator>> {
        // ---
        let row: Option<IndicatorRow> = sqlx::query_as(
            "SELECT indicator_id, i, motor, updated_at FROM indicator WHERE indicator_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_indicator(&self.tz)))
    }

    async fn indicators(&self) -> Result<Vec<Indicator>> {
        // ---
        let rows: Vec<IndicatorRow> = sqlx::query_as(
            "SELECT indicator_id, i, motor, updated_at FROM indicator ORDER BY indicator_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_indicator(&self.tz)).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
