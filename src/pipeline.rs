//! Pure batch logic: timestamp synthesis, threshold gate and grouped read-back.
//!
//! Nothing in here touches the store. Callers capture "now" once per
//! request with [`capture_instant`] and pass it in.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, SubsecRound, Utc};
use uuid::Uuid;

use crate::{Batch, BatchSummary, Reading, Sample};

// ---

/// A batch is kept only if some sample reaches this current.
pub const THRESHOLD: f64 = 400.0;

/// Current instant in `offset`, truncated to the microsecond precision of
/// `TIMESTAMPTZ` so stored rows read back equal to what was synthesized.
pub fn capture_instant(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset).trunc_subsecs(6)
}

/// Timestamp a batch, generating a fresh batch id.
///
/// Returns `None` for an empty batch; no id is generated in that case.
pub fn synthesize(
    samples: &[Sample],
    now: DateTime<FixedOffset>,
    device_id: Option<i32>,
) -> Option<Batch> {
    // ---
    if samples.is_empty() {
        return None;
    }
    Some(synthesize_with_id(samples, now, device_id, Uuid::new_v4()))
}

/// Timestamp a batch under a given id.
///
/// Sample `k` of `n` gets `now - (n - 1 - k)` seconds, so the last sample is
/// pinned to `now` and earlier ones recede one second each. Input order is
/// preserved.
pub fn synthesize_with_id(
    samples: &[Sample],
    now: DateTime<FixedOffset>,
    device_id: Option<i32>,
    batch_id: Uuid,
) -> Batch {
    // ---
    let n = samples.len() as i64;
    let readings = samples
        .iter()
        .enumerate()
        .map(|(k, sample)| Reading {
            sample_index: sample.sample_index,
            value: sample.value,
            timestamp: now - Duration::seconds(n - 1 - k as i64),
            batch_id,
            device_id,
        })
        .collect();

    Batch { batch_id, readings }
}

/// True if any sample meets or exceeds [`THRESHOLD`].
///
/// The gate is all-or-nothing: a passing batch is stored whole, including
/// its sub-threshold samples.
pub fn passes_threshold(samples: &[Sample]) -> bool {
    samples.iter().any(|s| s.value >= THRESHOLD)
}

/// Group rows by batch id and keep the earliest timestamp of each group.
///
/// Output order is unspecified; see [`newest_first`].
pub fn group_earliest(rows: &[Reading]) -> Vec<BatchSummary> {
    // ---
    let mut earliest: HashMap<Uuid, DateTime<FixedOffset>> = HashMap::new();
    for row in rows {
        earliest
            .entry(row.batch_id)
            .and_modify(|ts| {
                if row.timestamp < *ts {
                    *ts = row.timestamp;
                }
            })
            .or_insert(row.timestamp);
    }

    earliest
        .into_iter()
        .map(|(batch_id, earliest)| BatchSummary { batch_id, earliest })
        .collect()
}

/// Sort summaries by earliest timestamp, newest batch first. Ties break on id.
pub fn newest_first(summaries: &mut [BatchSummary]) {
    summaries.sort_by(|a, b| {
        b.earliest
            .cmp(&a.earliest)
            .then_with(|| a.batch_id.cmp(&b.batch_id))
    });
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn now() -> DateTime<FixedOffset> {
        // ---
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 12, 0, 0)
            .unwrap()
    }

    fn samples(values: &[f64]) -> Vec<Sample> {
        // ---
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample {
                sample_index: i as i64 + 1,
                value: *v,
            })
            .collect()
    }

    fn row(batch_id: Uuid, secs: i64) -> Reading {
        // ---
        Reading {
            sample_index: 0,
            value: 0.0,
            timestamp: now() + Duration::seconds(secs),
            batch_id,
            device_id: None,
        }
    }

    #[test]
    fn test_timestamps_recede_one_second_from_now() {
        // ---
        for n in 1..=12 {
            let input = samples(&vec![1.0; n]);
            let batch = synthesize(&input, now(), None).unwrap();

            assert_eq!(batch.readings.len(), n);
            assert_eq!(batch.readings[n - 1].timestamp, now());
            for (k, reading) in batch.readings.iter().enumerate() {
                let expected = now() - Duration::seconds((n - 1 - k) as i64);
                assert_eq!(reading.timestamp, expected, "n={} k={}", n, k);
            }
        }
    }

    #[test]
    fn test_synthesis_preserves_order_and_values() {
        // ---
        let input = vec![
            Sample { sample_index: 9, value: 3.5 },
            Sample { sample_index: 2, value: 410.0 },
            Sample { sample_index: 5, value: 0.0 },
        ];
        let batch = synthesize(&input, now(), Some(4)).unwrap();

        let indices: Vec<_> = batch.readings.iter().map(|r| r.sample_index).collect();
        let values: Vec<_> = batch.readings.iter().map(|r| r.value).collect();
        assert_eq!(indices, vec![9, 2, 5]);
        assert_eq!(values, vec![3.5, 410.0, 0.0]);
        assert!(batch.readings.iter().all(|r| r.device_id == Some(4)));
    }

    #[test]
    fn test_timestamps_keep_the_capture_offset() {
        // ---
        let batch = synthesize(&samples(&[1.0, 2.0]), now(), None).unwrap();
        assert_eq!(batch.readings[0].timestamp.offset().local_minus_utc(), 7 * 3600);
        assert_eq!(
            batch.readings[0].timestamp.to_rfc3339(),
            "2026-10-19T11:59:59+07:00"
        );
    }

    #[test]
    fn test_capture_instant_has_microsecond_precision() {
        // ---
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        let captured = capture_instant(offset);

        assert_eq!(captured.timestamp_subsec_nanos() % 1_000, 0);
        assert_eq!(captured.offset().local_minus_utc(), 7 * 3600);

        let batch = synthesize(&samples(&[1.0, 2.0, 3.0]), captured, None).unwrap();
        for reading in &batch.readings {
            assert_eq!(reading.timestamp.timestamp_subsec_nanos() % 1_000, 0);
        }
        assert_eq!(batch.readings[2].timestamp, captured);
    }

    #[test]
    fn test_batch_shares_one_id() {
        // ---
        let batch = synthesize(&samples(&[1.0, 2.0, 3.0]), now(), None).unwrap();
        assert!(batch.readings.iter().all(|r| r.batch_id == batch.batch_id));
    }

    #[test]
    fn test_batch_ids_are_unique_across_submissions() {
        // ---
        let input = samples(&[1.0]);
        let ids: HashSet<Uuid> = (0..10_000)
            .map(|_| synthesize(&input, now(), None).unwrap().batch_id)
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        // ---
        assert!(synthesize(&[], now(), None).is_none());
        assert!(synthesize_with_id(&[], now(), None, Uuid::nil()).readings.is_empty());
    }

    #[test]
    fn test_threshold_gate() {
        // ---
        assert!(!passes_threshold(&[]));
        assert!(!passes_threshold(&samples(&[0.0, 120.0, 399.99])));
        assert!(passes_threshold(&samples(&[0.0, 400.0])));
        assert!(passes_threshold(&samples(&[401.0, 1.0, 2.0])));
    }

    #[test]
    fn test_group_earliest_takes_minimum_regardless_of_order() {
        // ---
        let a = Uuid::from_u128(0xa);
        let b = Uuid::from_u128(0xb);
        let forward = vec![row(a, 5), row(a, 3), row(b, 10)];
        let mut reversed = forward.clone();
        reversed.reverse();

        for rows in [forward, reversed] {
            let mut grouped = group_earliest(&rows);
            grouped.sort_by_key(|s| s.batch_id);
            assert_eq!(
                grouped,
                vec![
                    BatchSummary { batch_id: a, earliest: now() + Duration::seconds(3) },
                    BatchSummary { batch_id: b, earliest: now() + Duration::seconds(10) },
                ]
            );
        }
    }

    #[test]
    fn test_group_earliest_of_nothing_is_empty() {
        // ---
        assert!(group_earliest(&[]).is_empty());
    }

    #[test]
    fn test_newest_first_ordering() {
        // ---
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let mut grouped = group_earliest(&[row(a, 0), row(b, 60), row(c, 60)]);
        newest_first(&mut grouped);

        let order: Vec<_> = grouped.iter().map(|s| s.batch_id).collect();
        assert_eq!(order, vec![b, c, a]);
    }
}
