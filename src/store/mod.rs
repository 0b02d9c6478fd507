//! Backing store gateway.
//!
//! Handlers only ever see [`SharedStore`]. The concrete backend is picked at
//! startup by [`connect`] and closed by `main` after the server stops.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::config::StoreBackend;
use crate::{schema, Config, Indicator, IndicatorUpdate, Partition, Reading};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

pub type SharedStore = Arc<dyn Store>;

/// Sort direction on `(timestamp, sample)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Row filter for [`Store::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ReadingQuery {
    pub batch_id: Option<Uuid>,
    pub device_id: Option<i32>,
    /// Keep rows with `value >= min_value`.
    pub min_value: Option<f64>,
    pub order: Order,
    pub limit: Option<u32>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert every row or none of them. Returns the number of rows written.
    async fn bulk_insert(&self, partition: Partition, rows: &[Reading]) -> Result<u64>;

    async fn query(&self, partition: Partition, query: &ReadingQuery) -> Result<Vec<Reading>>;

    /// Create or overwrite one indicator, returning the stored state.
    async fn upsert_indicator(
        &self,
        update: &IndicatorUpdate,
        at: DateTime<FixedOffset>,
    ) -> Result<Indicator>;

    async fn indicator(&self, device_id: i32) -> Result<Option<Indicator>>;

    /// All indicators ordered by id.
    async fn indicators(&self) -> Result<Vec<Indicator>>;

    /// Release connections. Called once at shutdown.
    async fn close(&self);
}

/// Build the store selected by `cfg`, creating the schema where needed.
pub async fn connect(cfg: &Config) -> Result<SharedStore> {
    // ---
    match cfg.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let db_url = cfg
                .db_url
                .as_deref()
                .ok_or_else(|| anyhow!("DATABASE_URL must be set for the postgres backend"))?;

            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(cfg.db_pool_max)
                .connect(db_url)
                .await
                .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

            tracing::info!("Successfully connected to database");

            schema::create_schema(&pool).await?;

            Ok(Arc::new(PgStore::new(pool, cfg.utc_offset)))
        }
    }
}
