//! End-to-end ingest, query and aggregation workflows.

use anyhow::Result;
use serde_json::json;

use meter_cache_core::cache::{AggregationKind, Interval};
use meter_cache_core::codec;
use meter_cache_core::store::KvStore;

use super::helpers::*;

/// A full day of 15-minute readings lands in one bucket and reads back whole.
#[test]
fn test_full_day_of_quarter_hour_readings() -> Result<()> {
    let t = test_cache()?;
    let readings = (0..96)
        .map(|i| reading(&t.cache, "MTR-001", DAY_START + i * 15 * MINUTE, i as f64))
        .collect::<Result<Vec<_>>>()?;

    let summary = t.cache.ingest_many("MTR-001", readings)?;
    assert_eq!(summary.readings, 96);
    assert_eq!(summary.buckets_touched, 1);

    let hits = t.cache.query_range("MTR-001", DAY_START, DAY_START + DAY)?;
    assert_eq!(hits.len(), 96);
    assert!(hits.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));

    let count = t.cache.aggregate(
        "MTR-001",
        DAY_START,
        DAY_START + DAY,
        AggregationKind::Count,
        Interval::Hourly,
    )?;
    assert_eq!(count.value, Some(96.0));
    assert_eq!(count.count, 96);
    assert_eq!(count.interval, Interval::Hourly);
    Ok(())
}

#[test]
fn test_sum_and_avg_over_two_readings() -> Result<()> {
    let t = test_cache()?;
    t.cache.ingest_json(
        "MTR-001",
        &json!({ "meterId": "MTR-001", "timestamp": DAY_START + 10 * HOUR, "power": 100 }),
    )?;
    t.cache.ingest_json(
        "MTR-001",
        &json!({ "meterId": "MTR-001", "timestamp": DAY_START + 11 * HOUR, "power": 200 }),
    )?;

    let (start, end) = (DAY_START + 10 * HOUR, DAY_START + 11 * HOUR);
    let sum = t
        .cache
        .aggregate("MTR-001", start, end, AggregationKind::Sum, Interval::Hourly)?;
    let avg = t
        .cache
        .aggregate("MTR-001", start, end, "AVG".parse()?, "HOURLY".parse()?)?;
    assert_eq!(sum.value, Some(300.0));
    assert_eq!(avg.value, Some(150.0));
    assert_eq!(avg.count, 2);

    let min = t
        .cache
        .aggregate("MTR-001", start, end, AggregationKind::Min, Interval::Daily)?;
    let max = t
        .cache
        .aggregate("MTR-001", start, end, AggregationKind::Max, Interval::Daily)?;
    assert!(max.value >= min.value);
    assert_eq!(min.value, Some(100.0));
    Ok(())
}

#[test]
fn test_empty_window_yields_null_value() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 5.0)?)?;

    let result = t.cache.aggregate(
        "MTR-001",
        DAY_START + HOUR,
        DAY_START + 2 * HOUR,
        AggregationKind::Sum,
        Interval::FifteenMinutes,
    )?;
    assert_eq!(result.value, None);
    assert_eq!(result.count, 0);

    let other_owner =
        t.cache
            .aggregate("MTR-404", DAY_START, DAY_START + DAY, AggregationKind::Avg, Interval::Daily)?;
    assert_eq!(other_owner.value, None);
    assert_eq!(serde_json::to_value(&other_owner)?["value"], serde_json::Value::Null);
    Ok(())
}

#[test]
fn test_reingest_replaces_reading() -> Result<()> {
    let t = test_cache()?;
    let ts = DAY_START + 3 * HOUR;
    t.cache.ingest("MTR-001", reading(&t.cache, "MTR-001", ts, 1.0)?)?;
    t.cache.ingest("MTR-001", reading(&t.cache, "MTR-001", ts, 2.0)?)?;

    let hits = t.cache.query_range("MTR-001", DAY_START, DAY_START + DAY)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get_f64("power")?, 2.0);
    Ok(())
}

#[test]
fn test_query_spans_days_in_order() -> Result<()> {
    let t = test_cache()?;
    // Ingest later days first so stored order differs from time order.
    for day in (0..3).rev() {
        for slot in [20, 5, 12] {
            let ts = DAY_START + day * DAY + slot * HOUR;
            t.cache
                .ingest("MTR-007", reading(&t.cache, "MTR-007", ts, slot as f64)?)?;
        }
    }

    let start = DAY_START + 6 * HOUR;
    let end = DAY_START + 2 * DAY + 13 * HOUR;
    let hits = t.cache.query_range("MTR-007", start, end)?;
    let offsets: Vec<i64> = hits.iter().map(|r| (r.timestamp() - DAY_START) / HOUR).collect();
    assert_eq!(offsets, vec![12, 20, 24 + 5, 24 + 12, 24 + 20, 48 + 5, 48 + 12]);
    Ok(())
}

#[test]
fn test_owners_are_isolated() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START, 1.0)?)?;
    t.cache
        .ingest("MTR-002", reading(&t.cache, "MTR-002", DAY_START, 2.0)?)?;

    let hits = t.cache.query_range("MTR-002", DAY_START, DAY_START + 1)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("meterId")?.as_str(), Some("MTR-002"));
    assert_eq!(t.cache.stats()?.size, 2);
    Ok(())
}

#[test]
fn test_stored_payload_is_self_describing() -> Result<()> {
    let t = test_cache()?;
    t.cache
        .ingest("MTR-001", reading(&t.cache, "MTR-001", DAY_START + HOUR, 9.0)?)?;

    let stored = t
        .store
        .get("MTR-001:2026-02-18")?
        .expect("bucket stored under owner:date key");
    let header = codec::decode_bucket_header(&stored)?;
    assert_eq!(header.owner_id, "MTR-001");
    assert_eq!(header.kind, "MeterBucket");
    assert_eq!(header.reading_count, 1);
    Ok(())
}
