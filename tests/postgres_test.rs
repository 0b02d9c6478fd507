//! Store tests against a live PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a scratch database; the test returns
//! early when it is unset. Checks share one connection so schema creation
//! runs once.

use anyhow::Result;
use chrono::Duration;
use uuid::Uuid;

use arus_logger::config::StoreBackend;
use arus_logger::pipeline::{capture_instant, synthesize};
use arus_logger::store::{self, Order, ReadingQuery};
use arus_logger::{Config, IndicatorUpdate, Partition, Sample, SharedStore};

async fn connect() -> Result<Option<(SharedStore, Config)>> {
    // ---
    let Ok(db_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping postgres test");
        return Ok(None);
    };

    let config = Config {
        store_backend: StoreBackend::Postgres,
        db_url: Some(db_url),
        ..Config::default()
    };
    let store = store::connect(&config).await?;
    Ok(Some((store, config)))
}

/// An indicator id unlikely to collide with rows left by earlier runs.
fn fresh_device_id() -> i32 {
    (Uuid::new_v4().as_u128() & 0x3fff_ffff) as i32
}

fn samples(n: usize) -> Vec<Sample> {
    // ---
    (0..n)
        .map(|i| Sample {
            sample_index: i as i64 + 1,
            value: 400.0 + i as f64 * 0.5,
        })
        .collect()
}

#[tokio::test]
async fn postgres_backend_round_trips() -> Result<()> {
    // ---
    let Some((store, config)) = connect().await? else {
        return Ok(());
    };

    upsert_overwrites_and_keeps_label(&store, &config).await?;
    batch_reads_back_in_capture_order(&store, &config).await?;
    large_batch_is_written_whole(&store, &config).await?;

    store.close().await;
    Ok(())
}

async fn upsert_overwrites_and_keeps_label(store: &SharedStore, config: &Config) -> Result<()> {
    // ---
    let device_id = fresh_device_id();

    let first_at = capture_instant(config.utc_offset);
    let second_at = first_at + Duration::seconds(5);

    let first = IndicatorUpdate {
        device_id,
        value: 10.0,
        label: Some("pump-a".to_string()),
    };
    let second = IndicatorUpdate {
        device_id,
        value: 20.0,
        label: None,
    };

    store.upsert_indicator(&first, first_at).await?;
    let returned = store.upsert_indicator(&second, second_at).await?;

    assert_eq!(returned.last_value, 20.0);
    assert_eq!(returned.label.as_deref(), Some("pump-a"));
    assert_eq!(returned.updated_at, second_at);

    let stored = store.indicator(device_id).await?.expect("indicator row");
    assert_eq!(stored, returned);
    assert_eq!(stored.updated_at.offset().local_minus_utc(), 7 * 3600);

    let matching = store
        .indicators()
        .await?
        .into_iter()
        .filter(|i| i.device_id == device_id)
        .count();
    assert_eq!(matching, 1);

    Ok(())
}

async fn batch_reads_back_in_capture_order(store: &SharedStore, config: &Config) -> Result<()> {
    // ---
    let device_id = fresh_device_id();
    let now = capture_instant(config.utc_offset);
    let batch = synthesize(&samples(4), now, Some(device_id)).expect("non-empty batch");

    let written = store.bulk_insert(Partition::Log6, &batch.readings).await?;
    assert_eq!(written, 4);

    let ascending = ReadingQuery {
        batch_id: Some(batch.batch_id),
        order: Order::Ascending,
        ..Default::default()
    };
    let rows = store.query(Partition::Log6, &ascending).await?;
    assert_eq!(rows, batch.readings);
    assert_eq!(rows[3].timestamp, now);

    let latest_two = ReadingQuery {
        batch_id: Some(batch.batch_id),
        order: Order::Descending,
        limit: Some(2),
        ..Default::default()
    };
    let rows = store.query(Partition::Log6, &latest_two).await?;
    let indices: Vec<_> = rows.iter().map(|r| r.sample_index).collect();
    assert_eq!(indices, vec![4, 3]);

    let other_table = store.query(Partition::Log1, &ascending).await?;
    assert!(other_table.is_empty());

    Ok(())
}

async fn large_batch_is_written_whole(store: &SharedStore, config: &Config) -> Result<()> {
    // ---
    let batch = synthesize(&samples(2_500), capture_instant(config.utc_offset), None)
        .expect("non-empty batch");

    let written = store.bulk_insert(Partition::Log2, &batch.readings).await?;
    assert_eq!(written, 2_500);

    let query = ReadingQuery {
        batch_id: Some(batch.batch_id),
        ..Default::default()
    };
    let rows = store.query(Partition::Log2, &query).await?;
    assert_eq!(rows.len(), 2_500);
    assert_eq!(rows.first().map(|r| r.sample_index), Some(1));
    assert_eq!(rows.last().map(|r| r.sample_index), Some(2_500));
    Ok(())
}
