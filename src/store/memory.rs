//! In-process store with the same semantics as the Postgres backend.
//!
//! Used with `STORE_BACKEND=memory` and by the test suites. Every call is
//! counted so tests can assert that a rejected request never reached storage.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicUsize, Ordering as AtomicOrdering},
        Mutex, MutexGuard,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use super::{Order, ReadingQuery, Store};
use crate::{Indicator, IndicatorUpdate, Partition, Reading};

// ---

#[derive(Default)]
pub struct MemoryStore {
    readings: Mutex<HashMap<Partition, Vec<Reading>>>,
    indicators: Mutex<BTreeMap<i32, Indicator>>,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("memory store lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store calls made so far, `close` excluded.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of rows currently held for `partition`.
    pub fn row_count(&self, partition: Partition) -> usize {
        self.readings
            .lock()
            .map(|map| map.get(&partition).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn bulk_insert(&self, partition: Partition, rows: &[Reading]) -> Result<u64> {
        // ---
        self.record_call();
        let mut readings = lock(&self.readings)?;
        readings
            .entry(partition)
            .or_default()
            .extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn query(&self, partition: Partition, query: &ReadingQuery) -> Result<Vec<Reading>> {
        // ---
        self.record_call();
        let readings = lock(&self.readings)?;

        // (position, row) so equal timestamps keep insertion order, like `id` does in SQL
        let mut rows: Vec<(usize, &Reading)> = readings
            .get(&partition)
            .map(|rows| rows.iter().enumerate().collect())
            .unwrap_or_default();

        rows.retain(|(_, r)| {
            query.batch_id.map_or(true, |id| r.batch_id == id)
                && query.device_id.map_or(true, |id| r.device_id == Some(id))
                && query.min_value.map_or(true, |min| r.value >= min)
        });

        rows.sort_by(|(pa, a), (pb, b)| a.timestamp.cmp(&b.timestamp).then(pa.cmp(pb)));
        if query.order == Order::Descending {
            rows.reverse();
        }

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(rows.into_iter().take(limit).map(|(_, r)| r.clone()).collect())
    }

    async fn upsert_indicator(
        &self,
        update: &IndicatorUpdate,
        at: DateTime<FixedOffset>,
    ) -> Result<Indicator> {
        // ---
        self.record_call();
        let mut indicators = lock(&self.indicators)?;
        let stored = indicators
            .entry(update.device_id)
            .and_modify(|existing| update.apply_to(existing, at))
            .or_insert_with(|| update.to_indicator(at));
        Ok(stored.clone())
    }

    async fn indicator(&self, device_id: i32) -> Result<Option<Indicator>> {
        self.record_call();
        Ok(lock(&self.indicators)?.get(&device_id).cloned())
    }

    async fn indicators(&self) -> Result<Vec<Indicator>> {
        self.record_call();
        Ok(lock(&self.indicators)?.values().cloned().collect())
    }

    async fn close(&self) {
        tracing::debug!("Memory store closed after {} calls", self.calls());
    }
}
