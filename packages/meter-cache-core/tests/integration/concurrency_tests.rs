//! Concurrent callers against one cache.

use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Result;
use ntest::timeout;

use meter_cache_core::cache::{AggregationKind, Interval};

use super::helpers::*;

/// Many writers to the same owner and day must not lose readings.
#[timeout(10000)]
#[test]
fn test_concurrent_ingest_same_bucket() -> Result<()> {
    let t = Arc::new(test_cache()?);
    let threads = 8;
    let per_thread = 24;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|n| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> Result<()> {
                barrier.wait();
                for i in 0..per_thread {
                    let ts = DAY_START + ((i * threads + n) as i64) * 5 * MINUTE;
                    t.cache
                        .ingest("MTR-001", reading(&t.cache, "MTR-001", ts, 1.0)?)?;
                }
                Ok(())
            })
        })
        .collect();
    for h in handles {
        h.join().expect("ingest thread panicked")?;
    }

    let count = t.cache.aggregate(
        "MTR-001",
        DAY_START,
        DAY_START + DAY - 1,
        AggregationKind::Count,
        Interval::Daily,
    )?;
    assert_eq!(count.count, threads * per_thread);
    Ok(())
}

/// Readers running alongside writers always see sorted, duplicate-free data.
#[timeout(10000)]
#[test]
fn test_queries_during_ingest() -> Result<()> {
    let t = Arc::new(test_cache()?);

    let writer = {
        let t = Arc::clone(&t);
        thread::spawn(move || -> Result<()> {
            for i in 0..200 {
                let ts = DAY_START + (i % 96) * 15 * MINUTE;
                t.cache
                    .ingest("MTR-009", reading(&t.cache, "MTR-009", ts, i as f64)?)?;
            }
            Ok(())
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let t = Arc::clone(&t);
            thread::spawn(move || -> Result<()> {
                for _ in 0..50 {
                    let hits = t.cache.query_range("MTR-009", DAY_START, DAY_START + DAY - 1)?;
                    assert!(hits.len() <= 96);
                    assert!(hits.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
                }
                Ok(())
            })
        })
        .collect();

    writer.join().expect("writer panicked")?;
    for r in readers {
        r.join().expect("reader panicked")?;
    }

    let hits = t.cache.query_range("MTR-009", DAY_START, DAY_START + DAY - 1)?;
    assert_eq!(hits.len(), 96);
    // Last write for slot 0 was i = 192.
    assert_eq!(hits[0].get_f64("power")?, 192.0);
    Ok(())
}
